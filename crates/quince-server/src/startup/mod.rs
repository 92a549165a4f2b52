//! Application startup utilities module.

mod database;
mod logging;
mod migrate;
mod retention;
mod shutdown;

pub use database::init_persistence;
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use migrate::run_startup_migrations;
pub use retention::{RetentionSettings, start_history_retention_task};
pub use shutdown::{ShutdownSignal, run_with_shutdown, wait_for_shutdown_signal};
