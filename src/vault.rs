use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bundle::SecretData;
use crate::error::{AuthError, WriteError};

const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Result of probing `/v1/sys/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Active,
    Standby,
    DrSecondary,
    PerformanceStandby,
    Uninitialized,
    Sealed,
    Unreachable(String),
}

impl HealthStatus {
    /// Map a health endpoint status code. Vault uses non-2xx codes for
    /// reachable-but-not-active nodes.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => HealthStatus::Standby,
            472 => HealthStatus::DrSecondary,
            473 => HealthStatus::PerformanceStandby,
            501 => HealthStatus::Uninitialized,
            503 => HealthStatus::Sealed,
            _ if status.is_success() => HealthStatus::Active,
            code => HealthStatus::Unreachable(format!("health check returned HTTP {}", code)),
        }
    }

    pub fn is_reachable(&self) -> bool {
        !matches!(self, HealthStatus::Unreachable(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Active => f.write_str("active"),
            HealthStatus::Standby => f.write_str("standby"),
            HealthStatus::DrSecondary => f.write_str("DR secondary"),
            HealthStatus::PerformanceStandby => f.write_str("performance standby"),
            HealthStatus::Uninitialized => f.write_str("uninitialized"),
            HealthStatus::Sealed => f.write_str("sealed"),
            HealthStatus::Unreachable(reason) => f.write_str(reason),
        }
    }
}

/// Operations the wizard needs from a Vault-compatible server.
#[async_trait]
pub trait VaultApi: Send + Sync {
    async fn check_health(&self, server_url: &str) -> HealthStatus;

    async fn lookup_token(
        &self,
        server_url: &str,
        token: &str,
        namespace: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Exchange AppRole credentials for a client token.
    async fn login_approle(
        &self,
        server_url: &str,
        role_id: &str,
        secret_id: &str,
        namespace: Option<&str>,
    ) -> Result<String, AuthError>;

    /// Store one bundle at `{secrets_path}/{name}`.
    async fn write_secret(
        &self,
        target: &SecretTarget<'_>,
        token: &str,
        name: &str,
        data: &SecretData,
    ) -> Result<(), WriteError>;
}

/// Where bundles are written.
#[derive(Debug, Clone, Copy)]
pub struct SecretTarget<'a> {
    pub server_url: &'a str,
    pub secrets_path: &'a str,
    pub namespace: Option<&'a str>,
}

/// Build `{server}/v1/{segments...}`, dropping empty segments and stray slashes.
pub fn api_url(server_url: &str, segments: &[&str]) -> String {
    let mut url = format!("{}/v1", server_url.trim().trim_end_matches('/'));
    for segment in segments {
        let segment = segment.trim().trim_matches('/');
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    url
}

pub fn approle_login_url(server_url: &str, namespace: Option<&str>) -> String {
    api_url(
        server_url,
        &[namespace.unwrap_or_default(), "auth/approle/login"],
    )
}

pub fn secret_url(target: &SecretTarget<'_>, name: &str) -> String {
    api_url(
        target.server_url,
        &[target.namespace.unwrap_or_default(), target.secrets_path, name],
    )
}

#[derive(Serialize)]
struct AppRoleLogin<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[derive(Serialize)]
struct SecretPayload<'a> {
    data: &'a SecretData,
}

/// Response body text, or the read failure when the body cannot be read.
async fn read_body(resp: Response) -> String {
    resp.text()
        .await
        .unwrap_or_else(|e| format!("failed to read response body: {}", e))
}

fn with_namespace(req: RequestBuilder, namespace: Option<&str>) -> RequestBuilder {
    match namespace {
        Some(ns) => req.header(NAMESPACE_HEADER, ns),
        None => req,
    }
}

/// reqwest-backed client. No retries, no custom timeouts.
#[derive(Debug, Clone, Default)]
pub struct HttpVaultClient {
    http: Client,
}

impl HttpVaultClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultApi for HttpVaultClient {
    async fn check_health(&self, server_url: &str) -> HealthStatus {
        let url = api_url(server_url, &["sys/health"]);
        debug!("Health check {}", url);
        match self.http.get(&url).send().await {
            Ok(resp) => {
                let health = HealthStatus::from_status(resp.status());
                debug!("Health check status {} -> {:?}", resp.status(), health);
                health
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                HealthStatus::Unreachable(e.to_string())
            }
        }
    }

    async fn lookup_token(
        &self,
        server_url: &str,
        token: &str,
        namespace: Option<&str>,
    ) -> Result<(), AuthError> {
        let url = api_url(server_url, &["auth/token/lookup-self"]);
        debug!("Token lookup {}", url);
        let req = self.http.get(&url).header(TOKEN_HEADER, token);
        let resp = with_namespace(req, namespace).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = read_body(resp).await;
        debug!("Token lookup rejected with {}", status);
        Err(match status {
            StatusCode::FORBIDDEN => AuthError::InvalidToken { body },
            StatusCode::NOT_FOUND => AuthError::EndpointNotFound {
                endpoint: "Token lookup",
                body,
            },
            _ => AuthError::TokenLookupFailed {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn login_approle(
        &self,
        server_url: &str,
        role_id: &str,
        secret_id: &str,
        namespace: Option<&str>,
    ) -> Result<String, AuthError> {
        let url = approle_login_url(server_url, namespace);
        debug!("AppRole login {}", url);
        let req = self
            .http
            .post(&url)
            .json(&AppRoleLogin { role_id, secret_id });
        let resp = with_namespace(req, namespace).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = read_body(resp).await;
            debug!("AppRole login rejected with {}", status);
            return Err(match status {
                StatusCode::BAD_REQUEST => AuthError::InvalidAppRoleCredentials { body },
                StatusCode::NOT_FOUND => AuthError::EndpointNotFound {
                    endpoint: "AppRole login",
                    body,
                },
                _ => AuthError::AppRoleLoginFailed {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let body: Value = resp.json().await?;
        body["auth"]["client_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(AuthError::NoTokenReceived)
    }

    async fn write_secret(
        &self,
        target: &SecretTarget<'_>,
        token: &str,
        name: &str,
        data: &SecretData,
    ) -> Result<(), WriteError> {
        let url = secret_url(target, name);
        debug!("Writing {} key(s) to {}", data.len(), url);
        let req = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, token)
            .json(&SecretPayload { data });
        let resp = with_namespace(req, target.namespace).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = read_body(resp).await;
        Err(WriteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
