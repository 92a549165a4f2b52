//! Main entry point for the Quince server.
//!
//! Loads configuration, initializes logging and the database, runs the enabled
//! data migrations, then runs the history retention task until a shutdown
//! signal arrives.

use tracing::info;

use quince_server::{
    AppState, Configuration,
    startup::{self, start_history_retention_task},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Quince server");

    let persistence = startup::init_persistence(&configuration).await?;
    let state = AppState::new(configuration, persistence);
    startup::run_startup_migrations(&state.configuration, &state.migrate_service).await?;

    let shutdown = startup::wait_for_shutdown_signal();
    let mut shutdown_rx = shutdown.subscribe();

    let retention = start_history_retention_task(
        state.history_service.clone(),
        state.configuration.retention_settings(),
        &shutdown,
    );

    let _ = shutdown_rx.recv().await;
    retention.await?;

    info!("Quince server stopped");
    Ok(())
}
