use std::io;

use thiserror::Error;

/// Problems with user-supplied input: CSV rows and wizard form fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Line {line}: Missing required fields")]
    MissingFields { line: usize },
    #[error("Line {line}: expected 3 fields but found {found} (values containing commas are not supported)")]
    TooManyFields { line: usize, found: usize },
    #[error("Vault URL is required")]
    MissingServerUrl,
    #[error("Secrets path is required")]
    MissingSecretsPath,
    #[error("Token is required")]
    MissingToken,
    #[error("Role ID and Secret ID are required")]
    MissingAppRoleCredentials,
    #[error("Please select a CSV file")]
    NotCsvFile,
    #[error("No secrets loaded")]
    NoRecords,
    #[error("Found {0} validation errors")]
    InvalidRows(usize),
    #[error("Authenticate before continuing")]
    NotAuthenticated,
}

/// Failures of the authentication step. All of them abort the step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Vault server is not reachable: {0}")]
    Unreachable(String),
    #[error("Invalid Vault token (HTTP 403): {body}")]
    InvalidToken { body: String },
    #[error("Invalid Role ID or Secret ID (HTTP 400): {body}")]
    InvalidAppRoleCredentials { body: String },
    #[error("{endpoint} endpoint not found (HTTP 404): {body}")]
    EndpointNotFound { endpoint: &'static str, body: String },
    #[error("Token validation failed (HTTP {status}): {body}")]
    TokenLookupFailed { status: u16, body: String },
    #[error("AppRole authentication failed (HTTP {status}): {body}")]
    AppRoleLoginFailed { status: u16, body: String },
    #[error("No token received from AppRole authentication")]
    NoTokenReceived,
    #[error("request failed: {0}")]
    Transport(String),
}

/// Failure to store a single secret bundle. Never aborts a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("No Vault token available; authenticate first")]
    MissingToken,
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("There are no upload results to export")]
    Empty,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for WriteError {
    fn from(e: reqwest::Error) -> Self {
        WriteError::Transport(e.to_string())
    }
}
