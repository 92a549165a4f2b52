//! Configuration keys and their defaults

pub const APPLICATION_CONFIG_FILE: &str = "conf/application.yml";
pub const ENV_PREFIX: &str = "quince";

pub const DB_URL: &str = "db.url";
pub const DB_POOL_MAX: &str = "db.pool.config.maximumPoolSize";
pub const DB_POOL_MIN: &str = "db.pool.config.minimumPoolSize";
pub const DB_POOL_CONNECT_TIMEOUT: &str = "db.pool.config.connectionTimeout";
pub const DB_POOL_ACQUIRE_TIMEOUT: &str = "db.pool.config.initializationFailTimeout";
pub const DB_POOL_IDLE_TIMEOUT: &str = "db.pool.config.idleTimeout";
pub const DB_POOL_MAX_LIFETIME: &str = "db.pool.config.maxLifetime";
pub const DB_POOL_SQLX_LOGGING: &str = "db.pool.config.sqlxLogging";
pub const DB_AUTO_MIGRATE: &str = "quince.db.auto-migrate";

pub const CONFIG_RETENTION_DAYS: &str = "quince.config.retention.days";
pub const CONFIG_RETENTION_INTERVAL_SECS: &str = "quince.config.retention.interval-secs";
pub const CONFIG_RETENTION_BATCH_SIZE: &str = "quince.config.retention.batch-size";
pub const MAX_CONTENT: &str = "quince.config.max-content";

pub const NAMESPACE_MIGRATE_ENABLED: &str = "quince.namespace.migrate.enabled";
pub const NAMESPACE_MIGRATE_BATCH_SIZE: &str = "quince.namespace.migrate.batch-size";
pub const NAMESPACE_MIGRATE_RETRY_TIMES: &str = "quince.namespace.migrate.retry-times";
pub const NAMESPACE_MIGRATE_RETRY_INTERVAL_MS: &str = "quince.namespace.migrate.retry-interval-ms";
pub const GRAY_MIGRATE_ENABLED: &str = "quince.gray.migrate.enabled";

pub const LOGS_PATH: &str = "quince.logs.path";
pub const LOGS_CONSOLE: &str = "quince.logs.console";
pub const LOGS_FILE: &str = "quince.logs.file";
pub const LOGS_LEVEL: &str = "quince.logs.level";

pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_RETENTION_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_RETENTION_BATCH_SIZE: u64 = 1000;

pub const DEFAULT_MIGRATE_BATCH_SIZE: u64 = 100;
pub const DEFAULT_MIGRATE_RETRY_TIMES: u32 = 3;
pub const DEFAULT_MIGRATE_RETRY_INTERVAL_MS: u64 = 1000;
