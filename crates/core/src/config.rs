//! TOML-based configuration system for AliasSync.
//!
//! The backend token is never stored in the file. It is referenced by the
//! name of an environment variable (`token_env`) and resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity backend connection settings.
    pub vault: VaultConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Backend connection
// ---------------------------------------------------------------------------

/// Connection settings for the identity backend's HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base address, e.g. `https://vault.example.com:8200`.
    pub address: String,

    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Namespace sent with every request, if any.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Per-request timeout in seconds (default 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retry policy for reads that immediately follow a create.
    #[serde(default)]
    pub read_retry: ReadRetryConfig,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_token_env() -> String {
    "VAULT_TOKEN".into()
}
fn default_timeout() -> u64 {
    30
}

impl VaultConfig {
    /// The request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Newly written identity records may not be readable immediately on every
/// node of a cluster. Reads flagged as "new" retry not-found responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRetryConfig {
    /// Total attempts, including the first (default 20).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each subsequent one
    /// (default 100ms).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay (default 2000ms).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    20
}
fn default_initial_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    2000
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level or `EnvFilter` directive (default `info`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the token environment variable.
    ///
    /// The token is required for every API call, so a missing variable is an
    /// error here rather than a warning.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        self.vault.token = resolve_optional_env(&self.vault.token_env, "vault.token_env");
        if self.vault.token.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.vault.token_env.clone(),
                field: "vault.token_env".into(),
            });
        }

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault.address.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vault.address".into(),
                detail: "address must not be empty".into(),
            });
        }
        if !self.vault.address.starts_with("http://") && !self.vault.address.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "vault.address".into(),
                detail: "address must start with http:// or https://".into(),
            });
        }
        if self.vault.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vault.timeout_secs".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        if self.vault.read_retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vault.read_retry.max_attempts".into(),
                detail: "at least one attempt is required".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// A commented sample configuration, written by `aliassync init`.
    pub fn sample() -> &'static str {
        r#"# AliasSync configuration

[vault]
address = "https://127.0.0.1:8200"
# Name of the environment variable that holds the API token.
token_env = "VAULT_TOKEN"
# namespace = "admin"
timeout_secs = 30

[vault.read_retry]
max_attempts = 20
initial_delay_ms = 100
max_delay_ms = 2000

[logging]
log_level = "info"
"#
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
