//! Entity alias records: local state, request payload, and typed response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AliasError;
use crate::vault::Secret;

/// Local declarative state for one entity alias.
///
/// An empty `id` means the alias does not exist (yet, or any more).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasState {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub mount_accessor: String,
    pub canonical_id: String,
    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
    /// Set while the record was created during the current operation.
    #[serde(skip)]
    pub is_new: bool,
}

impl AliasState {
    pub fn new(
        name: impl Into<String>,
        mount_accessor: impl Into<String>,
        canonical_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mount_accessor: mount_accessor.into(),
            canonical_id: canonical_id.into(),
            ..Default::default()
        }
    }

    /// A record known only by its backend ID, as used for import.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_metadata.insert(key.into(), value.into());
        self
    }

    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Request payload
// ---------------------------------------------------------------------------

/// Write payload for create and update.
///
/// Empty strings and an empty metadata map are left out of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRequest<'a> {
    pub name: &'a str,
    pub mount_accessor: &'a str,
    pub canonical_id: &'a str,
    pub custom_metadata: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a AliasState> for AliasRequest<'a> {
    fn from(state: &'a AliasState) -> Self {
        Self {
            name: &state.name,
            mount_accessor: &state.mount_accessor,
            canonical_id: &state.canonical_id,
            custom_metadata: &state.custom_metadata,
        }
    }
}

impl AliasRequest<'_> {
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        put_string(&mut body, "name", self.name);
        put_string(&mut body, "mount_accessor", self.mount_accessor);
        put_string(&mut body, "canonical_id", self.canonical_id);
        put_metadata(&mut body, "custom_metadata", self.custom_metadata);
        Value::Object(body)
    }
}

fn put_string(body: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        body.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn put_metadata(body: &mut Map<String, Value>, key: &str, value: &BTreeMap<String, String>) {
    if !value.is_empty() {
        let map = value
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        body.insert(key.to_string(), Value::Object(map));
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// The alias fields read back from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasData {
    pub id: String,
    pub name: String,
    pub mount_accessor: String,
    pub canonical_id: String,
    pub custom_metadata: BTreeMap<String, String>,
}

impl AliasData {
    /// Decode every field, stopping at the first one that is missing or of
    /// the wrong type.
    pub fn from_secret(secret: &Secret) -> Result<Self, AliasError> {
        let data = secret.data.as_ref().ok_or(AliasError::EmptyResponse)?;
        Ok(Self {
            id: string_field(data, "id")?,
            name: string_field(data, "name")?,
            mount_accessor: string_field(data, "mount_accessor")?,
            canonical_id: string_field(data, "canonical_id")?,
            custom_metadata: metadata_field(data, "custom_metadata")?,
        })
    }

    /// Overwrite the ID and all declared fields of `state`.
    pub fn apply_to(self, state: &mut AliasState) {
        state.id = self.id;
        state.name = self.name;
        state.mount_accessor = self.mount_accessor;
        state.canonical_id = self.canonical_id;
        state.custom_metadata = self.custom_metadata;
    }
}

/// Extract the ID the backend assigned in a create response.
pub fn created_alias_id(secret: &Secret) -> Result<String, AliasError> {
    let data = secret.data.as_ref().ok_or(AliasError::EmptyResponse)?;
    let id = string_field(data, "id")?;
    if id.is_empty() {
        return Err(AliasError::MalformedField {
            field: "id".into(),
            detail: "empty".into(),
        });
    }
    Ok(id)
}

fn string_field(data: &Map<String, Value>, field: &str) -> Result<String, AliasError> {
    match data.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(AliasError::MalformedField {
            field: field.to_string(),
            detail: format!("expected a string, got {}", json_type(other)),
        }),
        None => Err(AliasError::MalformedField {
            field: field.to_string(),
            detail: "missing".into(),
        }),
    }
}

// The backend reports unset metadata as null.
fn metadata_field(
    data: &Map<String, Value>,
    field: &str,
) -> Result<BTreeMap<String, String>, AliasError> {
    let object = match data.get(field) {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(object)) => object,
        Some(other) => {
            return Err(AliasError::MalformedField {
                field: field.to_string(),
                detail: format!("expected a map, got {}", json_type(other)),
            })
        }
    };

    object
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k.clone(), s.clone())),
            other => Err(AliasError::MalformedField {
                field: field.to_string(),
                detail: format!("value for key {:?} is {}, not a string", k, json_type(other)),
            }),
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret(data: Value) -> Secret {
        match data {
            Value::Object(map) => Secret::with_data(map),
            _ => panic!("test data must be an object"),
        }
    }

    #[test]
    fn test_request_includes_all_set_fields() {
        let state = AliasState::new("svc-a", "auth_ldap_1", "ent-1").with_metadata("team", "db");
        let body = AliasRequest::from(&state).to_value();
        assert_eq!(
            body,
            json!({
                "name": "svc-a",
                "mount_accessor": "auth_ldap_1",
                "canonical_id": "ent-1",
                "custom_metadata": {"team": "db"}
            })
        );
    }

    #[test]
    fn test_request_omits_empty_metadata_and_strings() {
        let state = AliasState::new("svc-a", "auth_ldap_1", "");
        let body = AliasRequest::from(&state).to_value();
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("custom_metadata"));
        assert!(!obj.contains_key("canonical_id"));
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn test_request_never_carries_id() {
        let mut state = AliasState::new("a", "m", "c");
        state.id = "alias-1".into();
        let body = AliasRequest::from(&state).to_value();
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_decode_full_response() {
        let s = secret(json!({
            "id": "alias-1",
            "name": "svc-a",
            "mount_accessor": "auth_ldap_1",
            "canonical_id": "ent-1",
            "custom_metadata": {"team": "db"},
            "creation_time": "2024-01-01T00:00:00Z",
            "merged_from_canonical_ids": null
        }));
        let data = AliasData::from_secret(&s).unwrap();
        assert_eq!(data.id, "alias-1");
        assert_eq!(data.custom_metadata.get("team").map(String::as_str), Some("db"));

        let mut state = AliasState::default();
        data.apply_to(&mut state);
        assert_eq!(state.name, "svc-a");
        assert_eq!(state.canonical_id, "ent-1");
    }

    #[test]
    fn test_decode_null_metadata_is_empty() {
        let s = secret(json!({
            "id": "alias-1",
            "name": "svc-a",
            "mount_accessor": "m",
            "canonical_id": "c",
            "custom_metadata": null
        }));
        assert!(AliasData::from_secret(&s).unwrap().custom_metadata.is_empty());
    }

    #[test]
    fn test_decode_reports_first_bad_field() {
        let s = secret(json!({
            "id": "alias-1",
            "name": "svc-a",
            "mount_accessor": 42,
            "canonical_id": "c",
            "custom_metadata": ["not", "a", "map"]
        }));
        match AliasData::from_secret(&s) {
            Err(AliasError::MalformedField { field, detail }) => {
                assert_eq!(field, "mount_accessor");
                assert!(detail.contains("a number"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_non_string_metadata_value() {
        let s = secret(json!({
            "id": "alias-1",
            "name": "svc-a",
            "mount_accessor": "m",
            "canonical_id": "c",
            "custom_metadata": {"count": 3}
        }));
        assert!(matches!(
            AliasData::from_secret(&s),
            Err(AliasError::MalformedField { ref field, .. }) if field == "custom_metadata"
        ));
    }

    #[test]
    fn test_decode_without_data() {
        assert!(matches!(
            AliasData::from_secret(&Secret::default()),
            Err(AliasError::EmptyResponse)
        ));
    }

    #[test]
    fn test_created_alias_id() {
        let s = secret(json!({"id": "alias-9", "canonical_id": "ent-1"}));
        assert_eq!(created_alias_id(&s).unwrap(), "alias-9");

        let s = secret(json!({"canonical_id": "ent-1"}));
        assert!(matches!(
            created_alias_id(&s),
            Err(AliasError::MalformedField { ref field, .. }) if field == "id"
        ));
    }
}
