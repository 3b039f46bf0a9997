//! HTTP client for the identity backend's API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::logical::{LogicalClient, Secret};
use crate::config::VaultConfig;
use crate::errors::{ApiError, ConfigError};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Body of a non-success response.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Asynchronous backend API client.
#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    address: String,
}

impl VaultClient {
    pub fn new(
        address: impl Into<String>,
        token: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let address = address.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        let mut token_value = HeaderValue::from_str(token).map_err(|_| {
            ApiError::AuthenticationFailed("token contains invalid header characters".into())
        })?;
        token_value.set_sensitive(true);
        headers.insert(TOKEN_HEADER, token_value);
        if let Some(ns) = namespace {
            let ns_value = HeaderValue::from_str(ns)
                .map_err(|_| ApiError::ParseError(format!("invalid namespace {:?}", ns)))?;
            headers.insert(NAMESPACE_HEADER, ns_value);
        }
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("aliassync/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        info!(address = %address, namespace = ?namespace, "created VaultClient");
        Ok(Self { http, address })
    }

    /// Build a client from resolved configuration.
    pub fn from_config(config: &VaultConfig) -> Result<Self, ConfigError> {
        let token = config
            .token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: config.token_env.clone(),
                field: "vault.token_env".into(),
            })?;
        Self::new(
            config.address.as_str(),
            token,
            config.namespace.as_deref(),
            config.timeout(),
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "vault".into(),
            detail: e.to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<Secret>, ApiError> {
        let mut req = self.http.request(method, self.url(path));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(check_status(status, path, &text));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let secret: Secret =
            serde_json::from_str(&text).map_err(|e| ApiError::ParseError(e.to_string()))?;
        if let Some(ref warnings) = secret.warnings {
            for warning in warnings {
                warn!(path, warning = %warning, "backend returned a warning");
            }
        }
        Ok(Some(secret))
    }
}

/// Map a non-success status and body to an [`ApiError`].
fn check_status(status: StatusCode, path: &str, body: &str) -> ApiError {
    let errors = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.errors)
        .unwrap_or_default();

    match status.as_u16() {
        404 if errors.is_empty() => ApiError::NotFound {
            path: path.to_string(),
        },
        401 | 403 => ApiError::AuthenticationFailed(if errors.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, errors.join("; "))
        }),
        code => ApiError::Api {
            status: code,
            path: path.to_string(),
            errors,
        },
    }
}

#[async_trait]
impl LogicalClient for VaultClient {
    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> Result<Option<Secret>, ApiError> {
        let secret = self.send(Method::GET, path, &[], None).await?;
        debug!(found = secret.is_some(), "read path");
        Ok(secret)
    }

    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> Result<Option<Secret>, ApiError> {
        match self.send(Method::GET, path, &[("list", "true")], None).await {
            Err(e) if e.is_not_found() => {
                debug!("no keys under path");
                Ok(None)
            }
            other => other,
        }
    }

    #[instrument(skip(self, data))]
    async fn write(&self, path: &str, data: &Value) -> Result<Option<Secret>, ApiError> {
        let secret = self.send(Method::PUT, path, &[], Some(data)).await?;
        debug!(has_body = secret.is_some(), "wrote path");
        Ok(secret)
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        match self.send(Method::DELETE, path, &[], None).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("path already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VaultClient {
        VaultClient::new(
            "https://vault.example.com:8200/",
            "s.token",
            Some("team-a"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let c = client();
        assert_eq!(c.address(), "https://vault.example.com:8200");
        assert_eq!(
            c.url("identity/entity-alias/id/abc"),
            "https://vault.example.com:8200/v1/identity/entity-alias/id/abc"
        );
        assert_eq!(
            c.url("/identity/entity-alias"),
            "https://vault.example.com:8200/v1/identity/entity-alias"
        );
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let result = VaultClient::new("http://localhost:8200", "bad\ntoken", None, Duration::from_secs(1));
        assert!(matches!(result, Err(ApiError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_check_status_not_found() {
        let err = check_status(StatusCode::NOT_FOUND, "identity/entity-alias/id/x", r#"{"errors":[]}"#);
        assert!(matches!(err, ApiError::NotFound { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_check_status_not_found_with_errors_is_api_error() {
        let err = check_status(
            StatusCode::NOT_FOUND,
            "identity/entity-alias/id/x",
            r#"{"errors":["unsupported path"]}"#,
        );
        assert!(matches!(err, ApiError::Api { status: 404, .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_check_status_permission_denied() {
        let err = check_status(
            StatusCode::FORBIDDEN,
            "identity/entity-alias",
            r#"{"errors":["permission denied"]}"#,
        );
        match err {
            ApiError::AuthenticationFailed(msg) => assert!(msg.contains("permission denied")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_status_server_error_with_garbage_body() {
        let err = check_status(StatusCode::INTERNAL_SERVER_ERROR, "p", "<html>oops</html>");
        match err {
            ApiError::Api { status, errors, .. } => {
                assert_eq!(status, 500);
                assert!(errors.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
