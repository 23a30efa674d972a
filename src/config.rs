use std::env;
use std::path::PathBuf;

use crate::model::{AuthMode, SessionConfig};

pub const LOG_FILE: &str = "vault_upload.log";

pub const USAGE: &str = "Usage: vault-upload [--debug] [--csv <path>]

  --debug        write debug logs to vault_upload.log
  --csv <path>   prefill the CSV file path

Environment (also read from .env):
  VAULT_ADDR, VAULT_NAMESPACE, VAULT_SECRETS_PATH, VAULT_AUTH_METHOD (token|approle),
  VAULT_TOKEN, VAULT_ROLE_ID, VAULT_SECRET_ID";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub debug: bool,
    pub csv_path: Option<PathBuf>,
    pub help: bool,
}

impl CliOptions {
    pub fn from_env() -> Result<Self, String> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut opts = CliOptions::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--debug" => opts.debug = true,
                "-h" | "--help" => opts.help = true,
                "--csv" => {
                    let path = args.next().ok_or("--csv requires a path")?;
                    opts.csv_path = Some(PathBuf::from(path));
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }
        Ok(opts)
    }
}

/// Prefill the session from `VAULT_*` variables. Empty values are ignored.
pub fn session_from_lookup<F>(lookup: F) -> SessionConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let auth_mode = match get("VAULT_AUTH_METHOD").map(|m| m.to_ascii_lowercase()) {
        Some(m) if m == "approle" => AuthMode::AppRole,
        _ => AuthMode::Token,
    };
    SessionConfig {
        server_url: get("VAULT_ADDR").unwrap_or_default(),
        namespace: get("VAULT_NAMESPACE"),
        secrets_path: get("VAULT_SECRETS_PATH").unwrap_or_default(),
        auth_mode,
        token: get("VAULT_TOKEN"),
        role_id: get("VAULT_ROLE_ID"),
        secret_id: get("VAULT_SECRET_ID"),
    }
}

/// Load `.env` if present, then read the process environment.
pub fn session_from_env() -> SessionConfig {
    dotenv::dotenv().ok();
    session_from_lookup(|key| env::var(key).ok())
}
