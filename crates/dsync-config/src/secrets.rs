//! Registry credential resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** under
//!   `registry.credentials_env` (e.g. `email: "DSYNC_EMAIL"`).
//! - Callers invoke [`resolve_credentials`] once per run and hand the result
//!   to the registry client; do not scatter `std::env::var` calls elsewhere.
//! - `Debug` redacts the password.
//! - Error messages reference the env var **NAME**, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_EMAIL_ENV: &str = "DSYNC_EMAIL";
pub const DEFAULT_PASSWORD_ENV: &str = "DSYNC_PASSWORD";

/// Login credentials resolved from the environment.
#[derive(Clone)]
pub struct ResolvedCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("email", &self.email)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Read a non-empty string value at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a named environment variable; unset or blank is `None`.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Env var names for the registry login, with defaults when not configured.
pub fn credential_env_names(config_json: &Value) -> (String, String) {
    (
        read_str_at(config_json, "/registry/credentials_env/email")
            .unwrap_or_else(|| DEFAULT_EMAIL_ENV.to_string()),
        read_str_at(config_json, "/registry/credentials_env/password")
            .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string()),
    )
}

/// Resolve registry login credentials from the environment.
///
/// # Errors
/// Names the first missing env var. The value is never mentioned.
pub fn resolve_credentials(config_json: &Value) -> Result<ResolvedCredentials> {
    let (email_var, password_var) = credential_env_names(config_json);

    let Some(email) = resolve_env(&email_var) else {
        bail!("SECRETS_MISSING: required env var '{email_var}' (registry email) is not set or empty");
    };
    let Some(password) = resolve_env(&password_var) else {
        bail!(
            "SECRETS_MISSING: required env var '{password_var}' (registry password) is not set or empty"
        );
    };

    Ok(ResolvedCredentials {
        email: email.trim().to_string(),
        password,
    })
}
