//! Configuration management for Quince server
//!
//! This module handles loading and accessing application configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::Level;

use quince_config::MigrateSettings;
use quince_config::validation::DEFAULT_MAX_CONTENT;

use super::constants::*;
use crate::startup::{LoggingConfig, RetentionSettings};

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[arg(long = "db-url", env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(short = 'c', long = "config", default_value = APPLICATION_CONFIG_FILE)]
    config_file: String,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration using the command line arguments of the process
    pub fn new() -> Result<Self, ConfigError> {
        let args = Cli::parse();
        Self::load(&args.config_file, args.database_url)
    }

    /// Merge the config file, `QUINCE_` environment variables and a database
    /// URL override, later sources winning
    pub fn load(config_file: &str, database_url: Option<String>) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .add_source(config::File::with_name(config_file))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(".")
                    .try_parsing(true),
            );

        if let Some(v) = database_url {
            config_builder = config_builder.set_override(DB_URL, v)?;
        }

        Ok(Configuration {
            config: config_builder.build()?,
        })
    }

    // ========================================================================
    // Database Configuration
    // ========================================================================

    pub fn db_url(&self) -> Result<String, ConfigError> {
        self.config.get_string(DB_URL)
    }

    pub fn auto_migrate(&self) -> bool {
        self.config.get_bool(DB_AUTO_MIGRATE).unwrap_or(true)
    }

    pub async fn database_connection(&self) -> anyhow::Result<DatabaseConnection> {
        let max_connections = self.config.get_int(DB_POOL_MAX).unwrap_or(100) as u32;
        let min_connections = self.config.get_int(DB_POOL_MIN).unwrap_or(1) as u32;
        let connect_timeout = self
            .config
            .get_int(DB_POOL_CONNECT_TIMEOUT)
            .unwrap_or(30) as u64;
        let acquire_timeout = self
            .config
            .get_int(DB_POOL_ACQUIRE_TIMEOUT)
            .unwrap_or(8) as u64;
        let idle_timeout = self.config.get_int(DB_POOL_IDLE_TIMEOUT).unwrap_or(10) as u64;
        let max_lifetime = self.config.get_int(DB_POOL_MAX_LIFETIME).unwrap_or(1800) as u64;
        let sqlx_logging = self.config.get_bool(DB_POOL_SQLX_LOGGING).unwrap_or(false);

        let url = self.db_url()?;

        let mut opt = ConnectOptions::new(url);

        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .acquire_timeout(Duration::from_secs(acquire_timeout))
            .idle_timeout(Duration::from_secs(idle_timeout))
            .max_lifetime(Duration::from_secs(max_lifetime))
            .sqlx_logging(sqlx_logging);

        tracing::info!(
            max_connections = max_connections,
            min_connections = min_connections,
            connect_timeout = connect_timeout,
            idle_timeout = idle_timeout,
            max_lifetime = max_lifetime,
            sqlx_logging = sqlx_logging,
            "Database connection pool configured"
        );

        let database_connection: DatabaseConnection = Database::connect(opt).await?;

        Ok(database_connection)
    }

    // ========================================================================
    // Config Service Configuration
    // ========================================================================

    /// Maximum accepted content size in bytes
    pub fn max_content(&self) -> usize {
        self.config
            .get_int(MAX_CONTENT)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_CONTENT)
    }

    pub fn retention_settings(&self) -> RetentionSettings {
        let days = self
            .config
            .get_int(CONFIG_RETENTION_DAYS)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_RETENTION_DAYS);
        let interval_secs = self
            .config
            .get_int(CONFIG_RETENTION_INTERVAL_SECS)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RETENTION_INTERVAL_SECS);
        let batch_size = self
            .config
            .get_int(CONFIG_RETENTION_BATCH_SIZE)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RETENTION_BATCH_SIZE);

        RetentionSettings {
            days,
            interval: Duration::from_secs(interval_secs),
            batch_size,
        }
    }

    // ========================================================================
    // Migration Configuration
    // ========================================================================

    /// Mirror the blank tenant and `public` at startup
    pub fn namespace_migrate_enabled(&self) -> bool {
        self.config.get_bool(NAMESPACE_MIGRATE_ENABLED).unwrap_or(false)
    }

    /// Fold beta and tag configs into gray configs at startup
    pub fn gray_migrate_enabled(&self) -> bool {
        self.config.get_bool(GRAY_MIGRATE_ENABLED).unwrap_or(false)
    }

    pub fn migrate_settings(&self) -> MigrateSettings {
        let batch_size = self
            .config
            .get_int(NAMESPACE_MIGRATE_BATCH_SIZE)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MIGRATE_BATCH_SIZE);
        let max_retries = self
            .config
            .get_int(NAMESPACE_MIGRATE_RETRY_TIMES)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_MIGRATE_RETRY_TIMES);
        let retry_interval_ms = self
            .config
            .get_int(NAMESPACE_MIGRATE_RETRY_INTERVAL_MS)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_MIGRATE_RETRY_INTERVAL_MS);

        MigrateSettings {
            batch_size,
            max_retries,
            retry_interval: Duration::from_millis(retry_interval_ms),
        }
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    /// Logging settings; config keys take precedence over `QUINCE_LOG_*` variables
    pub fn logging_config(&self) -> LoggingConfig {
        let env = LoggingConfig::from_env();
        let level = self
            .config
            .get_string(LOGS_LEVEL)
            .ok()
            .and_then(|v| v.parse::<Level>().ok());

        LoggingConfig {
            log_dir: self
                .config
                .get_string(LOGS_PATH)
                .map(PathBuf::from)
                .unwrap_or(env.log_dir),
            console_output: self
                .config
                .get_bool(LOGS_CONSOLE)
                .unwrap_or(env.console_output),
            console_level: level.unwrap_or(env.console_level),
            file_logging: self.config.get_bool(LOGS_FILE).unwrap_or(env.file_logging),
            file_level: level.unwrap_or(env.file_level),
            rotation: env.rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = path.to_string_lossy().to_string();
        (dir, path)
    }

    #[test]
    fn test_load_reads_file_values() {
        let (_dir, path) = write_config(
            r#"
db:
  url: "sqlite::memory:"
quince:
  db:
    auto-migrate: false
  config:
    max-content: 2048
    retention:
      days: 7
      interval-secs: 60
      batch-size: 50
  namespace:
    migrate:
      enabled: true
      batch-size: 20
      retry-times: 1
      retry-interval-ms: 50
  gray:
    migrate:
      enabled: true
  logs:
    path: /tmp/quince-test-logs
    console: false
    level: debug
"#,
        );

        let configuration = Configuration::load(&path, None).unwrap();
        assert_eq!(configuration.db_url().unwrap(), "sqlite::memory:");
        assert!(!configuration.auto_migrate());
        assert_eq!(configuration.max_content(), 2048);

        let retention = configuration.retention_settings();
        assert_eq!(retention.days, 7);
        assert_eq!(retention.interval, Duration::from_secs(60));
        assert_eq!(retention.batch_size, 50);

        assert!(configuration.namespace_migrate_enabled());
        assert!(configuration.gray_migrate_enabled());
        let migrate = configuration.migrate_settings();
        assert_eq!(migrate.batch_size, 20);
        assert_eq!(migrate.max_retries, 1);
        assert_eq!(migrate.retry_interval, Duration::from_millis(50));

        let logging = configuration.logging_config();
        assert_eq!(logging.log_dir, PathBuf::from("/tmp/quince-test-logs"));
        assert!(!logging.console_output);
        assert_eq!(logging.file_level, Level::DEBUG);
    }

    #[test]
    fn test_defaults_when_keys_missing() {
        let (_dir, path) = write_config("db:\n  url: \"sqlite::memory:\"\n");
        let configuration = Configuration::load(&path, None).unwrap();

        assert!(configuration.auto_migrate());
        assert_eq!(configuration.max_content(), DEFAULT_MAX_CONTENT);
        let retention = configuration.retention_settings();
        assert_eq!(retention.days, DEFAULT_RETENTION_DAYS);
        assert_eq!(
            retention.interval,
            Duration::from_secs(DEFAULT_RETENTION_INTERVAL_SECS)
        );
        assert_eq!(retention.batch_size, DEFAULT_RETENTION_BATCH_SIZE);

        assert!(!configuration.namespace_migrate_enabled());
        assert!(!configuration.gray_migrate_enabled());
        let migrate = configuration.migrate_settings();
        assert_eq!(migrate.batch_size, DEFAULT_MIGRATE_BATCH_SIZE);
        assert_eq!(migrate.max_retries, DEFAULT_MIGRATE_RETRY_TIMES);
    }

    #[test]
    fn test_database_url_override() {
        let (_dir, path) = write_config("db:\n  url: \"mysql://localhost/quince\"\n");
        let configuration =
            Configuration::load(&path, Some("sqlite::memory:".to_string())).unwrap();
        assert_eq!(configuration.db_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(Configuration::load("/nonexistent/quince/application.yml", None).is_err());
    }
}
