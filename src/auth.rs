use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::model::{Credentials, SessionConfig};
use crate::vault::VaultApi;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Idle,
    Authenticating,
    Success,
    Error(String),
}

/// What a successful authentication adds to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Token obtained from an AppRole login; `None` in token mode.
    pub derived_token: Option<String>,
}

/// Validate credentials, probe the server, then run the mode-specific call.
///
/// Credential checks happen before any network traffic.
pub async fn authenticate<C>(client: &C, config: &SessionConfig) -> Result<AuthOutcome, AuthError>
where
    C: VaultApi + ?Sized,
{
    let credentials = config.credentials()?;
    let server_url = config.server_url.as_str();
    let namespace = config.namespace();

    let health = client.check_health(server_url).await;
    if !health.is_reachable() {
        warn!("Vault at {} unreachable: {}", server_url, health);
        return Err(AuthError::Unreachable(health.to_string()));
    }
    debug!("Vault reachable ({})", health);

    match credentials {
        Credentials::Token(token) => {
            client.lookup_token(server_url, token, namespace).await?;
            info!("Token authentication succeeded");
            Ok(AuthOutcome {
                derived_token: None,
            })
        }
        Credentials::AppRole { role_id, secret_id } => {
            let token = client
                .login_approle(server_url, role_id, secret_id, namespace)
                .await?;
            if token.is_empty() {
                return Err(AuthError::NoTokenReceived);
            }
            info!("AppRole authentication succeeded");
            Ok(AuthOutcome {
                derived_token: Some(token),
            })
        }
    }
}

/// Tracks the authenticate step: Idle -> Authenticating -> Success | Error.
#[derive(Debug, Clone, Default)]
pub struct AuthController {
    state: AuthState,
}

impl AuthController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Success
    }

    pub fn is_busy(&self) -> bool {
        self.state == AuthState::Authenticating
    }

    /// Enter `Authenticating`. Allowed from any state so the step can be re-run.
    pub fn begin(&mut self) {
        self.state = AuthState::Authenticating;
    }

    /// Apply a finished attempt, writing a derived token back into the config.
    pub fn finish(&mut self, result: Result<AuthOutcome, AuthError>, config: &mut SessionConfig) {
        self.state = match result {
            Ok(outcome) => {
                if let Some(token) = outcome.derived_token {
                    config.token = Some(token);
                }
                AuthState::Success
            }
            Err(e) => AuthState::Error(e.to_string()),
        };
    }

    pub fn reset(&mut self) {
        self.state = AuthState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::SecretData;
    use crate::error::WriteError;
    use crate::model::AuthMode;
    use crate::vault::{HealthStatus, HttpVaultClient, SecretTarget};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    impl AuthController {
        /// begin, authenticate and finish in one call.
        async fn run<C>(&mut self, client: &C, config: &mut SessionConfig) -> &AuthState
        where
            C: VaultApi + ?Sized,
        {
            self.begin();
            let result = authenticate(client, config).await;
            self.finish(result, config);
            &self.state
        }
    }

    /// Scripted client that records which endpoints were hit.
    struct Scripted {
        health: HealthStatus,
        lookup: Result<(), AuthError>,
        login: Result<String, AuthError>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                health: HealthStatus::Active,
                lookup: Ok(()),
                login: Ok("hvs.role-token".into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VaultApi for Scripted {
        async fn check_health(&self, _server_url: &str) -> HealthStatus {
            self.calls.lock().unwrap().push("health");
            self.health.clone()
        }

        async fn lookup_token(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), AuthError> {
            self.calls.lock().unwrap().push("lookup");
            self.lookup.clone()
        }

        async fn login_approle(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<String, AuthError> {
            self.calls.lock().unwrap().push("login");
            self.login.clone()
        }

        async fn write_secret(
            &self,
            _: &SecretTarget<'_>,
            _: &str,
            _: &str,
            _: &SecretData,
        ) -> Result<(), WriteError> {
            unreachable!("authentication never writes")
        }
    }

    fn config(mode: AuthMode) -> SessionConfig {
        SessionConfig {
            server_url: "http://vault".into(),
            secrets_path: "kv/data".into(),
            auth_mode: mode,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_token_fails_without_network() {
        let client = Scripted::new();
        let mut cfg = config(AuthMode::Token);
        cfg.token = Some(String::new());
        let mut auth = AuthController::new();

        let state = auth.run(&client, &mut cfg).await.clone();
        assert_eq!(state, AuthState::Error("Token is required".into()));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_approle_ids_fail_without_network() {
        let client = Scripted::new();
        let mut cfg = config(AuthMode::AppRole);
        cfg.role_id = Some("role".into());
        let mut auth = AuthController::new();

        let state = auth.run(&client, &mut cfg).await.clone();
        assert_eq!(
            state,
            AuthState::Error("Role ID and Secret ID are required".into())
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_stops_before_login() {
        let mut client = Scripted::new();
        client.health = HealthStatus::Unreachable("connection refused".into());
        let mut cfg = config(AuthMode::Token);
        cfg.token = Some("hvs.t".into());
        let mut auth = AuthController::new();

        let state = auth.run(&client, &mut cfg).await.clone();
        assert_eq!(
            state,
            AuthState::Error("Vault server is not reachable: connection refused".into())
        );
        assert_eq!(client.calls(), vec!["health"]);
    }

    #[tokio::test]
    async fn test_sealed_server_still_authenticates() {
        let mut client = Scripted::new();
        client.health = HealthStatus::Sealed;
        let mut cfg = config(AuthMode::Token);
        cfg.token = Some("hvs.t".into());
        let mut auth = AuthController::new();

        assert_eq!(*auth.run(&client, &mut cfg).await, AuthState::Success);
        assert_eq!(client.calls(), vec!["health", "lookup"]);
        assert_eq!(cfg.token.as_deref(), Some("hvs.t"));
    }

    #[tokio::test]
    async fn test_rejected_token_reports_reason() {
        let mut client = Scripted::new();
        client.lookup = Err(AuthError::InvalidToken {
            body: "permission denied".into(),
        });
        let mut cfg = config(AuthMode::Token);
        cfg.token = Some("hvs.t".into());
        let mut auth = AuthController::new();

        auth.run(&client, &mut cfg).await;
        assert!(!auth.is_authenticated());
        assert_eq!(
            auth.state(),
            &AuthState::Error("Invalid Vault token (HTTP 403): permission denied".into())
        );
    }

    #[tokio::test]
    async fn test_approle_writes_token_back() {
        let client = Scripted::new();
        let mut cfg = config(AuthMode::AppRole);
        cfg.role_id = Some("role".into());
        cfg.secret_id = Some("secret".into());
        let mut auth = AuthController::new();

        assert_eq!(*auth.run(&client, &mut cfg).await, AuthState::Success);
        assert_eq!(cfg.token.as_deref(), Some("hvs.role-token"));
        assert_eq!(client.calls(), vec!["health", "login"]);
    }

    #[tokio::test]
    async fn test_approle_empty_token_is_rejected() {
        let mut client = Scripted::new();
        client.login = Ok(String::new());
        let mut cfg = config(AuthMode::AppRole);
        cfg.role_id = Some("role".into());
        cfg.secret_id = Some("secret".into());
        let mut auth = AuthController::new();

        auth.run(&client, &mut cfg).await;
        assert_eq!(
            auth.state(),
            &AuthState::Error("No token received from AppRole authentication".into())
        );
        assert!(!auth.is_authenticated());
        assert_eq!(cfg.token, None);
        assert_eq!(client.calls(), vec!["health", "login"]);
    }

    #[tokio::test]
    async fn test_approle_without_client_token_leaves_config_unset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/approle/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"auth": {}})),
            )
            .mount(&server)
            .await;

        let mut cfg = config(AuthMode::AppRole);
        cfg.server_url = server.uri();
        cfg.role_id = Some("role".into());
        cfg.secret_id = Some("secret".into());
        let mut auth = AuthController::new();

        auth.run(&HttpVaultClient::new(), &mut cfg).await;
        assert_eq!(
            auth.state(),
            &AuthState::Error("No token received from AppRole authentication".into())
        );
        assert_eq!(cfg.token, None);
    }

    #[tokio::test]
    async fn test_health_503_proceeds_to_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(AuthMode::Token);
        cfg.server_url = server.uri();
        cfg.token = Some("hvs.t".into());
        let mut auth = AuthController::new();

        assert_eq!(
            *auth.run(&HttpVaultClient::new(), &mut cfg).await,
            AuthState::Success
        );
    }

    #[test]
    fn test_state_is_reenterable() {
        let mut cfg = config(AuthMode::Token);
        let mut auth = AuthController::new();
        auth.begin();
        assert!(auth.is_busy());
        auth.finish(Err(AuthError::NoTokenReceived), &mut cfg);
        assert!(matches!(auth.state(), AuthState::Error(_)));
        auth.begin();
        auth.finish(
            Ok(AuthOutcome {
                derived_token: None,
            }),
            &mut cfg,
        );
        assert!(auth.is_authenticated());
        auth.reset();
        assert_eq!(auth.state(), &AuthState::Idle);
    }
}
