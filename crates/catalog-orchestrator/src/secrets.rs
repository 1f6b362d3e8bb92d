//! Credential resolution for service API keys.
//!
//! A key can be given in three ways, checked in this order:
//!
//! 1. `apiKey` - inline value, for local runs
//! 2. `apiKeyFile` - path to a mounted secret file
//! 3. `apiKeyEnvVar` - name of an environment variable

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential source configured (need one of: apiKey, apiKeyFile, apiKeyEnvVar)")]
    NoSourceProvided,

    #[error("Failed to read credential file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Credential from {source_kind} is empty")]
    Empty { source_kind: &'static str },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a service credential comes from. Embedded in each service's
/// config section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
}

impl CredentialSource {
    pub fn is_configured(&self) -> bool {
        has_secret_source(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }

    /// Resolves the key, or `None` if no source is configured.
    pub fn resolve(&self) -> Result<Option<SecretString>> {
        resolve_secret_optional(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }
}

/// Resolves a secret from the first non-empty source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::Empty {
                source_kind: "file",
            });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) if value.trim().is_empty() => Err(SecretError::Empty {
                source_kind: "environment",
            }),
            Ok(value) => Ok(SecretString::from(value.trim())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a missing source is `Ok(None)`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    direct.is_some_and(|s| !s.is_empty())
        || file_path.is_some_and(|s| !s.is_empty())
        || env_var.is_some_and(|s| !s.is_empty())
}

/// Expands a leading `~` to the home directory. `~user` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
