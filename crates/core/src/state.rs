//! Manifest and state files for the command-line front end.
//!
//! The manifest (TOML) declares the desired alias:
//!
//! ```toml
//! name = "db-alias"
//! mount_accessor = "auth_ldap_1234"
//! canonical_id = "ent-123"
//!
//! [custom_metadata]
//! team = "storage"
//! ```
//!
//! The state file (JSON) holds the single alias record last reconciled from
//! the backend. No state file means no alias is tracked.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::StateError;
use crate::identity::AliasState;

/// Desired alias fields, as written by the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasManifest {
    pub name: String,
    pub mount_accessor: String,
    pub canonical_id: String,
    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
}

impl AliasManifest {
    /// Load and validate a manifest.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading alias manifest");

        if !path.exists() {
            return Err(StateError::ManifestNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let manifest: AliasManifest =
            toml::from_str(&contents).map_err(|e| StateError::ParseError {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// All three string fields are required.
    pub fn validate(&self) -> Result<(), StateError> {
        for (field, value) in [
            ("name", &self.name),
            ("mount_accessor", &self.mount_accessor),
            ("canonical_id", &self.canonical_id),
        ] {
            if value.trim().is_empty() {
                return Err(StateError::InvalidValue {
                    field: field.into(),
                    detail: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }

    /// Copy the declared fields onto `state`, keeping its ID.
    pub fn apply_to(&self, state: &mut AliasState) {
        state.name = self.name.clone();
        state.mount_accessor = self.mount_accessor.clone();
        state.canonical_id = self.canonical_id.clone();
        state.custom_metadata = self.custom_metadata.clone();
    }
}

/// Reader/writer for the JSON state file.
pub struct StateFile;

impl StateFile {
    /// Load the tracked alias, or `None` if no state file exists.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<AliasState>, StateError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no state file");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        let state: AliasState =
            serde_json::from_str(&contents).map_err(|e| StateError::ParseError {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        debug!(path = %path.display(), id = %state.id, "loaded state");
        Ok(Some(state).filter(AliasState::exists))
    }

    /// Persist `state`. A state without an ID removes the file instead.
    pub fn save<P: AsRef<Path>>(path: P, state: &AliasState) -> Result<(), StateError> {
        let path = path.as_ref();
        if !state.exists() {
            if path.exists() {
                info!(path = %path.display(), "alias no longer tracked, removing state file");
                std::fs::remove_file(path)?;
            }
            return Ok(());
        }

        let json = serde_json::to_string_pretty(state).map_err(|e| StateError::ParseError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), id = %state.id, "saved state");
        Ok(())
    }
}
