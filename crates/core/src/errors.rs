//! Error types for the AliasSync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Lifecycle operations on entity aliases do not return these errors
//! directly; they convert them into [`crate::diag::Diagnostics`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Alias(#[from] AliasError),
}

// ---------------------------------------------------------------------------
// Remote API errors
// ---------------------------------------------------------------------------

/// Errors from the identity backend's HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP-level transport error (network, TLS, timeout, etc.).
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The addressed path does not exist.
    #[error("no value found at '{path}'")]
    NotFound { path: String },

    /// The API returned a non-success status code.
    #[error("API error (HTTP {status}) on '{path}': {}", .errors.join("; "))]
    Api {
        status: u16,
        path: String,
        errors: Vec<String>,
    },

    /// Token is missing, expired, or lacks permission for the path.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The response body could not be decoded.
    #[error("response parse error: {0}")]
    ParseError(String),
}

impl ApiError {
    /// Whether this error means the addressed record does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Alias decoding errors
// ---------------------------------------------------------------------------

/// Errors raised while turning an API response into typed alias data.
#[derive(Debug, Error)]
pub enum AliasError {
    /// A response field is missing or has the wrong shape.
    #[error("malformed response field '{field}': {detail}")]
    MalformedField { field: String, detail: String },

    /// The response carried no `data` object at all.
    #[error("response contained no data")]
    EmptyResponse,
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// State / manifest file errors
// ---------------------------------------------------------------------------

/// Errors from reading and writing the local state and manifest files.
#[derive(Debug, Error)]
pub enum StateError {
    /// The manifest file does not exist.
    #[error("manifest file not found: {0}")]
    ManifestNotFound(String),

    /// A manifest or state file could not be parsed.
    #[error("failed to parse '{path}': {detail}")]
    ParseError { path: String, detail: String },

    /// A declared field is empty or otherwise invalid.
    #[error("invalid value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error.
    #[error("state I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
