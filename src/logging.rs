//! Logger setup.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

use crate::server::ServerConfig;

/// Map a configured level name onto a filter. Unknown names fall back to
/// `Info`.
pub fn level_filter(name: &str) -> LevelFilter {
    match name.to_ascii_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" | "CRITICAL" | "FATAL" => LevelFilter::Error,
        "OFF" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// The log file for `config`, `<log_path>/<server_name>.log`.
pub fn log_file(config: &ServerConfig) -> PathBuf {
    PathBuf::from(&config.log_path).join(format!("{}.log", config.server_name))
}

/// Install the global logger.
///
/// `RUST_LOG`, when set, overrides the configured level. Output goes to the
/// log file; if it cannot be opened, to stderr. Calling this twice is a
/// no-op.
pub fn init(config: &ServerConfig) {
    let mut builder = Builder::new();
    builder.filter_level(level_filter(&config.log_level));
    builder.parse_env(Env::default());

    let path = log_file(config);
    let file = fs::create_dir_all(&config.log_path)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    let target_error = match file {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
            None
        }
        Err(e) => {
            builder.target(Target::Stderr);
            Some(e)
        }
    };

    // Forked children share this logger, so the pid is read per record.
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{ts} {level} {process} {target}] {args}",
            ts = buf.timestamp_millis(),
            level = record.level(),
            process = std::process::id(),
            target = record.target(),
            args = record.args()
        )
    });

    if builder.try_init().is_err() {
        return;
    }

    if let Some(e) = target_error {
        log::warn!("Cannot open log file {path}, logging to stderr: {e}", path = path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("WARNING"), LevelFilter::Warn);
        assert_eq!(level_filter("CRITICAL"), LevelFilter::Error);
        assert_eq!(level_filter("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_log_file_path() {
        let config = ServerConfig {
            log_path: "/var/log/graph".to_string(),
            server_name: "id_allocation".to_string(),
            ..ServerConfig::default()
        };
        assert_eq!(log_file(&config), PathBuf::from("/var/log/graph/id_allocation.log"));
    }
}
