//! Whole-file configuration.
//!
//! The settings file is TOML with a `[server]` table (see [`ServerConfig`])
//! and an `[id_allocation]` table naming the backend connections.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;

use crate::pool::PoolConfig;
use crate::server::ServerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Backend connection settings, the `[id_allocation]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendSettings {
    /// DSN of the write connection the allocation procedure runs on.
    pub write: String,
    /// DSN of the read replica. No shipped route reads yet.
    #[serde(default)]
    pub read: String,
    /// Borrow write connections from a pool instead of opening one per call.
    #[serde(default)]
    pub pooled: bool,
    #[serde(default = "default_pool_min_size")]
    pub pool_min_size: usize,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,
    /// Zero waits for a free connection indefinitely.
    #[serde(default)]
    pub acquire_timeout_ms: u64,
}

fn default_pool_min_size() -> usize {
    1
}

fn default_pool_max_size() -> usize {
    10
}

impl BackendSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_size: self.pool_min_size,
            max_size: self.pool_max_size,
            acquire_timeout: (self.acquire_timeout_ms > 0).then(|| Duration::from_millis(self.acquire_timeout_ms)),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.write.is_empty() {
            return Err(ConfigError::Invalid("id_allocation.write must not be empty".to_string()));
        }
        if self.pool_max_size == 0 {
            return Err(ConfigError::Invalid("id_allocation.pool_max_size must be at least 1".to_string()));
        }
        if self.pool_min_size > self.pool_max_size {
            return Err(ConfigError::Invalid(format!(
                "id_allocation.pool_min_size ({min}) exceeds pool_max_size ({max})",
                min = self.pool_min_size,
                max = self.pool_max_size
            )));
        }
        Ok(())
    }
}

/// The full settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub id_allocation: BackendSettings,
}

impl AppConfig {
    /// Parse, normalize and validate settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(text)?;
        config.server = config.server.normalize();
        config.server.validate()?;
        config.id_allocation.validate()?;
        Ok(config)
    }
}

/// Deployment environment, selecting the default settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn settings_path(&self) -> &'static str {
        match self {
            Environment::Development => "./config/development.toml",
            Environment::Testing => "/app/config/testing.toml",
            Environment::Production => "/app/config/production.toml",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::Invalid(format!("unknown environment: {s}"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Load the settings file at `path`.
pub fn load_settings(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    AppConfig::from_toml(&text)
}
