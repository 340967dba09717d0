//! Persona Hub configuration management

use crate::auth::UserRole;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Main Persona Hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaHubConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Principal resolution configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Persona lifecycle behavior
    #[serde(default)]
    pub personas: PersonasConfig,
}

impl PersonaHubConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make principal resolution ambiguous
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for user in &self.auth.users {
            if user.token.trim().is_empty() {
                return Err(Error::Config(format!(
                    "auth user {} has an empty token",
                    user.id
                )));
            }
            if !seen.insert(user.token.as_str()) {
                return Err(Error::Config(format!(
                    "auth token for user {} is not unique",
                    user.id
                )));
            }
        }
        if !self.auth.disabled && self.auth.users.is_empty() {
            tracing::warn!(
                "Auth is enabled but no users are configured; every request will be rejected"
            );
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

/// Principal resolution configuration
///
/// With `disabled = true` every request is treated as an anonymous
/// admin-tier caller, which suits single-user deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Skip principal resolution entirely
    pub disabled: bool,

    /// Static bearer tokens
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            disabled: true,
            users: Vec::new(),
        }
    }
}

/// A configured user and its bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub token: String,
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `personas.json`
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: dirs_next::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("persona-hub"),
        }
    }
}

/// What a display-priority batch does with ids that do not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdPolicy {
    /// Reject the whole batch on the first unknown id
    #[default]
    FailFast,
    /// Apply the known ids and report the rest
    SkipUnknown,
}

/// Persona lifecycle behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonasConfig {
    /// Seed the builtin default persona when the store is empty
    #[serde(default = "default_true")]
    pub seed_builtin: bool,

    /// Handling of unknown ids in display-priority batches
    #[serde(default)]
    pub unknown_id_policy: UnknownIdPolicy,
}

fn default_true() -> bool {
    true
}

impl Default for PersonasConfig {
    fn default() -> Self {
        Self {
            seed_builtin: true,
            unknown_id_policy: UnknownIdPolicy::FailFast,
        }
    }
}
