//! Gateway configuration.
//!
//! Loaded from a YAML file naming the two SQLite databases: the backing
//! database that statements execute against, and the grant store holding
//! permissions and key material.
//!
//! ```yaml
//! database:
//!   url: sqlite://data/app.db
//!   max_connections: 5
//! acl_store:
//!   url: sqlite://data/acl.db
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Backing database connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Grant store connection.
    #[serde(default)]
    pub acl_store: AclStoreConfig,
}

/// Backing database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Grant store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclStoreConfig {
    /// SQLite connection URL.
    #[serde(default = "default_acl_url")]
    pub url: String,
}

impl Default for AclStoreConfig {
    fn default() -> Self {
        Self {
            url: default_acl_url(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

fn default_database_url() -> String {
    "sqlite://rowgate.db".to_string()
}

fn default_acl_url() -> String {
    "sqlite://rowgate-acl.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}
