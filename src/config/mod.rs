mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

use crate::notifications::DEFAULT_CHANNEL_CAPACITY;

pub const PROVIDER_DB_FILE: &str = "provider.db";
pub const PREFERENCES_DB_FILE: &str = "preferences.db";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    /// Default directive handed to the log filter.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub notification_capacity: Option<usize>,
    pub logging_level: LoggingLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub notification_capacity: usize,
    pub logging_level: LoggingLevel,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let notification_capacity = file
            .notification_capacity
            .or(cli.notification_capacity)
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if notification_capacity == 0 {
            bail!("notification_capacity must be at least 1");
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or(cli.logging_level);

        Ok(Self {
            db_dir,
            notification_capacity,
            logging_level,
        })
    }

    pub fn provider_db_path(&self) -> PathBuf {
        self.db_dir.join(PROVIDER_DB_FILE)
    }

    pub fn preferences_db_path(&self) -> PathBuf {
        self.db_dir.join(PREFERENCES_DB_FILE)
    }
}

fn parse_logging_level(s: &str) -> Option<LoggingLevel> {
    LoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_parse_logging_level() {
        assert_eq!(parse_logging_level("debug"), Some(LoggingLevel::Debug));
        assert_eq!(parse_logging_level("WARN"), Some(LoggingLevel::Warn));
        assert!(parse_logging_level("loud").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            notification_capacity: Some(32),
            logging_level: LoggingLevel::Debug,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.notification_capacity, 32);
        assert_eq!(config.logging_level, LoggingLevel::Debug);
    }

    #[test]
    fn test_resolve_defaults() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.notification_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.logging_level, LoggingLevel::Info);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            notification_capacity: Some(8),
            logging_level: LoggingLevel::Error,
        };
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            notification_capacity: Some(64),
            logging_level: Some("trace".to_string()),
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.notification_capacity, 64);
        assert_eq!(config.logging_level, LoggingLevel::Trace);
    }

    #[test]
    fn test_resolve_invalid_toml_logging_level_falls_back_to_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            logging_level: LoggingLevel::Warn,
            ..Default::default()
        };
        let file_config = FileConfig {
            logging_level: Some("loud".to_string()),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert_eq!(config.logging_level, LoggingLevel::Warn);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/to/db")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_dir = make_temp_db_dir();
        let file_path = temp_dir.path().join("not_a_dir");
        std::fs::write(&file_path, "").unwrap();
        let cli = CliConfig {
            db_dir: Some(file_path),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("is not a directory"));
    }

    #[test]
    fn test_resolve_zero_capacity_error() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            notification_capacity: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.provider_db_path(), temp_dir.path().join("provider.db"));
        assert_eq!(
            config.preferences_db_path(),
            temp_dir.path().join("preferences.db")
        );
    }
}
