//! Database bootstrap

use std::sync::Arc;

use tracing::info;

use quince_migration::{Migrator, MigratorTrait};
use quince_persistence::{ConfigPersistence, ExternalDbPersistService, PersistenceService};

use crate::model::Configuration;

/// Connect, migrate when enabled and check the backend is reachable
pub async fn init_persistence(
    configuration: &Configuration,
) -> anyhow::Result<Arc<dyn PersistenceService>> {
    let db = configuration.database_connection().await?;

    if configuration.auto_migrate() {
        Migrator::up(&db, None).await?;
        info!("Database migrations applied");
    }

    let persistence: Arc<dyn PersistenceService> = Arc::new(ExternalDbPersistService::new(db));
    persistence.health_check().await?;

    info!(
        storage_mode = %persistence.storage_mode(),
        configs = persistence.config_count().await?,
        "Persistence ready"
    );

    Ok(persistence)
}
