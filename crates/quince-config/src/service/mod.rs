//! Configuration service layer
//!
//! Services wrap a shared [`PersistenceService`](quince_persistence::PersistenceService):
//! - Config publish, removal, lookup, search and batch import
//! - Cross-tenant sync of base and gray configs
//! - History retention
//! - Namespace migration and beta/tag to gray migration
//! - Namespace management

pub mod config;
pub mod history;
pub mod migrate;
pub mod namespace;
pub mod sync;

pub use config::ConfigOperationService;
pub use history::HistoryService;
pub use migrate::{ConfigMigrateService, MigrateReport, MigrateSettings};
pub use namespace::NamespaceService;
pub use sync::{BaseSyncStore, ConfigSyncService, GraySyncStore, SyncStore, run_sync};

use quince_common::QuinceError;

pub(crate) fn is_uniqueness_conflict(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<QuinceError>(),
        Some(QuinceError::UniquenessConflict(_))
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use quince_migration::{Migrator, MigratorTrait};
    use quince_persistence::sea_orm::{ConnectOptions, Database};
    use quince_persistence::{ExternalDbPersistService, PersistenceService};

    use crate::model::ConfigPublishRequest;

    /// Fresh in-memory database behind the persistence trait object
    pub async fn persistence() -> Arc<dyn PersistenceService> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Arc::new(ExternalDbPersistService::new(db))
    }

    pub fn request(data_id: &str, tenant: &str, content: &str) -> ConfigPublishRequest {
        ConfigPublishRequest {
            app_name: Some("quince-app".to_string()),
            src_ip: "10.0.0.1".to_string(),
            src_user: "alice".to_string(),
            ..ConfigPublishRequest::new(data_id, "DEFAULT_GROUP", tenant, content)
        }
    }
}
