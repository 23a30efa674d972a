use std::fmt;

use crate::auth::AuthOutcome;
use crate::error::{AuthError, ValidationError};
use crate::upload::{UploadOrchestrator, UploadProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Token,
    AppRole,
}

impl AuthMode {
    pub fn toggle(self) -> Self {
        match self {
            AuthMode::Token => AuthMode::AppRole,
            AuthMode::AppRole => AuthMode::Token,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AuthMode::Token => "Token",
            AuthMode::AppRole => "AppRole",
        }
    }
}

/// Connection and credential settings collected by the wizard.
///
/// `token` is either typed in by the user (token mode) or written back by a
/// successful AppRole login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub server_url: String,
    pub namespace: Option<String>,
    pub secrets_path: String,
    pub auth_mode: AuthMode,
    pub token: Option<String>,
    pub role_id: Option<String>,
    pub secret_id: Option<String>,
}

/// Credentials required by the selected authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    Token(&'a str),
    AppRole { role_id: &'a str, secret_id: &'a str },
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SessionConfig {
    pub fn namespace(&self) -> Option<&str> {
        non_empty(&self.namespace)
    }

    pub fn token(&self) -> Option<&str> {
        non_empty(&self.token)
    }

    /// Checks the fields the configure step requires.
    pub fn validate_connection(&self) -> Result<(), ValidationError> {
        if self.server_url.trim().is_empty() {
            return Err(ValidationError::MissingServerUrl);
        }
        if self.secrets_path.trim().is_empty() {
            return Err(ValidationError::MissingSecretsPath);
        }
        Ok(())
    }

    /// Resolves the mode-specific credential set, failing when a required field is empty.
    pub fn credentials(&self) -> Result<Credentials<'_>, ValidationError> {
        match self.auth_mode {
            AuthMode::Token => self
                .token()
                .map(Credentials::Token)
                .ok_or(ValidationError::MissingToken),
            AuthMode::AppRole => match (non_empty(&self.role_id), non_empty(&self.secret_id)) {
                (Some(role_id), Some(secret_id)) => Ok(Credentials::AppRole { role_id, secret_id }),
                _ => Err(ValidationError::MissingAppRoleCredentials),
            },
        }
    }

    /// True when the fields that identify the target server differ.
    pub fn connection_changed(&self, other: &SessionConfig) -> bool {
        self.server_url != other.server_url
            || self.namespace() != other.namespace()
            || self.auth_mode != other.auth_mode
    }
}

/// One CSV data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Success,
    Error,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub secret_name: String,
    pub status: UploadStatus,
    pub message: Option<String>,
}

impl UploadResult {
    pub fn pending(secret_name: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            status: UploadStatus::Pending,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Configure,
    Authenticate,
    LoadFile,
    Upload,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Configure,
        WizardStep::Authenticate,
        WizardStep::LoadFile,
        WizardStep::Upload,
    ];

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Configure => "Configure Vault",
            WizardStep::Authenticate => "Authenticate",
            WizardStep::LoadFile => "Load Secrets",
            WizardStep::Upload => "Upload",
        }
    }

    pub fn number(self) -> usize {
        match self {
            WizardStep::Configure => 1,
            WizardStep::Authenticate => 2,
            WizardStep::LoadFile => 3,
            WizardStep::Upload => 4,
        }
    }
}

/// Focusable inputs on the configure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    ServerUrl,
    Namespace,
    SecretsPath,
    AuthMode,
}

impl ConfigField {
    pub fn next(self) -> Self {
        match self {
            ConfigField::ServerUrl => ConfigField::Namespace,
            ConfigField::Namespace => ConfigField::SecretsPath,
            ConfigField::SecretsPath => ConfigField::AuthMode,
            ConfigField::AuthMode => ConfigField::ServerUrl,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ConfigField::ServerUrl => ConfigField::AuthMode,
            ConfigField::Namespace => ConfigField::ServerUrl,
            ConfigField::SecretsPath => ConfigField::Namespace,
            ConfigField::AuthMode => ConfigField::SecretsPath,
        }
    }
}

/// Focusable inputs on the authenticate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Token,
    RoleId,
    SecretId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFocus {
    Path,
    Preview,
}

/// Messages from background tasks to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    AuthFinished(Result<AuthOutcome, AuthError>),
    UploadProgress(UploadProgress),
    UploadFinished(UploadOrchestrator),
}
