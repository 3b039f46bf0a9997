//! Backend paths and queries shared by identity resources.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::ReadRetryConfig;
use crate::errors::ApiError;
use crate::vault::{LogicalClient, Secret};

/// Collection path used to create entity aliases.
pub const ROOT_ALIAS_PATH: &str = "identity/entity-alias";

/// Root of the by-ID alias paths; also the lock root for alias mutations.
pub const ROOT_ALIAS_ID_PATH: &str = "identity/entity-alias/id";

/// Path of a single alias addressed by its ID.
pub fn join_alias_id(id: &str) -> String {
    format!("{}/{}", ROOT_ALIAS_ID_PATH, id)
}

/// Filter for [`find_aliases`]. Both fields must match exactly.
#[derive(Debug, Clone, Default)]
pub struct FindAliasParams {
    pub name: String,
    pub mount_accessor: String,
}

/// One entry of the alias listing's `key_info` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AliasSummary {
    /// Filled from the `key_info` key, not the entry body.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub mount_accessor: String,
    #[serde(default)]
    pub canonical_id: String,
    #[serde(default)]
    pub mount_type: String,
    #[serde(default)]
    pub mount_path: String,
}

/// List every alias and return those matching `params`, sorted by ID.
///
/// An empty listing (no aliases at all) is not an error.
pub async fn find_aliases(
    client: &dyn LogicalClient,
    params: &FindAliasParams,
) -> Result<Vec<AliasSummary>, ApiError> {
    let secret = match client.list(ROOT_ALIAS_ID_PATH).await? {
        Some(secret) => secret,
        None => return Ok(Vec::new()),
    };

    let key_info = match secret.data.as_ref().and_then(|d| d.get("key_info")) {
        Some(v) if !v.is_null() => v,
        _ => return Ok(Vec::new()),
    };
    let key_info = key_info
        .as_object()
        .ok_or_else(|| ApiError::ParseError("alias listing key_info is not an object".into()))?;

    let mut matches = Vec::new();
    for (id, info) in key_info {
        let mut summary: AliasSummary = serde_json::from_value(info.clone())
            .map_err(|e| ApiError::ParseError(format!("alias {:?} in listing: {}", id, e)))?;
        if summary.name == params.name && summary.mount_accessor == params.mount_accessor {
            summary.id = id.clone();
            matches.push(summary);
        }
    }
    matches.sort_by(|a, b| a.id.cmp(&b.id));

    debug!(
        name = %params.name,
        mount_accessor = %params.mount_accessor,
        scanned = key_info.len(),
        matched = matches.len(),
        "searched entity aliases"
    );
    Ok(matches)
}

/// How reads of freshly created records retry not-found responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReadRetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self::from(&ReadRetryConfig::default())
    }
}

impl From<&ReadRetryConfig> for ReadRetryPolicy {
    fn from(config: &ReadRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Read an identity record by path.
///
/// An empty response is reported as not found. When `retry` is set,
/// not-found results are retried with a doubling delay, since a record
/// written moments ago may not be visible yet. Other errors return
/// immediately.
pub async fn read_entity(
    client: &dyn LogicalClient,
    path: &str,
    retry: bool,
    policy: &ReadRetryPolicy,
) -> Result<Secret, ApiError> {
    let attempts = if retry { policy.max_attempts.max(1) } else { 1 };
    let mut delay = policy.initial_delay;

    let mut attempt = 1;
    loop {
        debug!(path, attempt, "reading identity record");
        match client.read(path).await {
            Ok(Some(secret)) => return Ok(secret),
            Ok(None) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if attempt >= attempts {
            return Err(ApiError::NotFound {
                path: path.to_string(),
            });
        }
        debug!(path, attempt, delay_ms = delay.as_millis() as u64, "record not visible yet, retrying");
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(policy.max_delay);
        attempt += 1;
    }
}
