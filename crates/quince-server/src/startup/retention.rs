//! Periodic history retention

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use quince_config::HistoryService;

use super::shutdown::{ShutdownSignal, run_with_shutdown};

/// How long history is kept and how it is deleted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionSettings {
    pub days: u32,
    pub interval: Duration,
    /// Rows deleted per statement
    pub batch_size: u64,
}

async fn retention_loop(history: &HistoryService, settings: RetentionSettings) {
    let mut interval = tokio::time::interval(settings.interval);
    loop {
        interval.tick().await;
        match history
            .cleanup_expired(settings.days, settings.batch_size)
            .await
        {
            Ok(removed) => debug!(removed, "History retention run completed"),
            Err(e) => error!(error = %e, "History retention run failed"),
        }
    }
}

/// Delete expired history every `settings.interval` until shutdown
///
/// The first run happens immediately.
pub fn start_history_retention_task(
    history: HistoryService,
    settings: RetentionSettings,
    shutdown: &ShutdownSignal,
) -> JoinHandle<()> {
    let shutdown_rx = shutdown.subscribe();

    tokio::spawn(async move {
        info!(
            retention_days = settings.days,
            interval = ?settings.interval,
            batch_size = settings.batch_size,
            "History retention task started"
        );

        run_with_shutdown(retention_loop(&history, settings), shutdown_rx).await;
        info!("History retention task stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quince_config::{ConfigOperationService, ConfigPublishRequest};
    use quince_migration::{Migrator, MigratorTrait};
    use quince_persistence::{ConfigKey, ExternalDbPersistService, PersistenceService};
    use sea_orm::{ConnectOptions, Database};

    use super::*;

    async fn persistence() -> Arc<dyn PersistenceService> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Arc::new(ExternalDbPersistService::new(db))
    }

    #[tokio::test]
    async fn test_retention_task_removes_expired_history() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        for content in ["v1", "v2"] {
            publisher
                .publish(&ConfigPublishRequest::new(
                    "app.yaml",
                    "DEFAULT_GROUP",
                    "",
                    content,
                ))
                .await
                .unwrap();
        }

        let history = HistoryService::new(persistence.clone());
        let shutdown = ShutdownSignal::new();
        let handle = start_history_retention_task(
            history.clone(),
            RetentionSettings {
                days: 0,
                interval: Duration::from_millis(20),
                batch_size: 1,
            },
            &shutdown,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "");
        assert_eq!(history.search_page(&key, 1, 10).await.unwrap().total_count, 0);

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
