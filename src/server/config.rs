//! Server configuration.

use std::net::{IpAddr, SocketAddr};
use serde::Deserialize;

use crate::settings::ConfigError;

/// Request size limit applied when `max_buffer_size` is left at zero.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100 * 1024 * 1024;

/// HTTP server configuration, the `[server]` table of the settings file.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address to bind to.
    #[serde(default = "default_ip")]
    pub ip: IpAddr,
    /// The port to bind to.
    pub port: u16,
    /// Working directory; always ends with `/` after [`ServerConfig::normalize`].
    pub work_path: String,
    /// Name used in logs and for the log file.
    pub server_name: String,
    /// Directory for log files.
    #[serde(default)]
    pub log_path: String,
    /// Log level name (`DEBUG`, `INFO`, ...).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted for compatibility with existing settings files; rotation is
    /// left to the host.
    #[serde(default)]
    pub log_max_size: u64,
    /// Number of concurrently executing handlers per process.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    /// Number of forked serving processes; zero serves from this process.
    #[serde(default)]
    pub process_count: usize,
    /// Maximum request size in bytes; zero selects [`DEFAULT_MAX_BUFFER_SIZE`].
    #[serde(default)]
    pub max_buffer_size: usize,
}

fn default_ip() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_thread_count() -> usize {
    8
}

impl ServerConfig {
    /// Fill in derived defaults: `./log` for an empty log path and a trailing
    /// `/` on the work path.
    pub fn normalize(mut self) -> Self {
        if self.log_path.is_empty() {
            self.log_path = "./log".to_string();
        }
        if !self.work_path.ends_with('/') {
            self.work_path.push('/');
        }
        self
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::Invalid("server.thread_count must be at least 1".to_string()));
        }
        if self.server_name.is_empty() {
            return Err(ConfigError::Invalid("server.server_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// The socket address to listen on.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// The effective request size limit.
    pub fn request_limit(&self) -> usize {
        if self.max_buffer_size > 0 {
            self.max_buffer_size
        } else {
            DEFAULT_MAX_BUFFER_SIZE
        }
    }

    /// Directory for runtime data, `<work_path>data`.
    pub fn data_path(&self) -> String {
        format!("{}data", self.work_path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: 8080,
            work_path: "./".to_string(),
            server_name: "id_allocation".to_string(),
            log_path: "./log".to_string(),
            log_level: default_log_level(),
            log_max_size: 0,
            thread_count: default_thread_count(),
            process_count: 0,
            max_buffer_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_table() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 9000
            work_path = "/srv/id_allocation"
            server_name = "id_allocation"
            "#,
        )
        .unwrap();
        let config = config.normalize();

        assert_eq!(config.addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.thread_count, 8);
        assert_eq!(config.process_count, 0);
        assert_eq!(config.log_path, "./log");
        assert_eq!(config.work_path, "/srv/id_allocation/");
        assert_eq!(config.data_path(), "/srv/id_allocation/data");
        assert_eq!(config.request_limit(), DEFAULT_MAX_BUFFER_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = ServerConfig {
            thread_count: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_explicit_buffer_limit() {
        let config = ServerConfig {
            max_buffer_size: 4096,
            ..ServerConfig::default()
        };
        assert_eq!(config.request_limit(), 4096);
    }
}
