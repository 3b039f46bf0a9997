//! Path-addressed ("logical") access to the identity backend.
//!
//! Everything the alias lifecycle needs from the backend goes through the
//! [`LogicalClient`] trait, so the reconciler can be driven by the real
//! HTTP client or by an in-memory implementation in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ApiError;

/// The standard response envelope returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Secret {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl Secret {
    /// Wrap a `data` object in an otherwise empty envelope.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Read/list/write/delete by path.
///
/// `Ok(None)` means the backend answered successfully without a body.
/// A missing path is reported as [`ApiError::NotFound`] by `read`; `list`
/// and `delete` treat it as "nothing there" instead.
#[async_trait]
pub trait LogicalClient: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<Secret>, ApiError>;

    async fn list(&self, path: &str) -> Result<Option<Secret>, ApiError>;

    async fn write(&self, path: &str, data: &Value) -> Result<Option<Secret>, ApiError>;

    async fn delete(&self, path: &str) -> Result<(), ApiError>;
}
