//! Shared application state

use std::sync::Arc;

use quince_config::{
    ConfigMigrateService, ConfigOperationService, ConfigSyncService, HistoryService,
    NamespaceService,
};
use quince_persistence::PersistenceService;

use super::config::Configuration;

/// Services wired over one persistence backend
#[derive(Clone)]
pub struct AppState {
    pub configuration: Configuration,
    pub persistence: Arc<dyn PersistenceService>,
    pub config_service: ConfigOperationService,
    pub sync_service: ConfigSyncService,
    pub history_service: HistoryService,
    pub namespace_service: NamespaceService,
    pub migrate_service: ConfigMigrateService,
}

impl AppState {
    pub fn new(configuration: Configuration, persistence: Arc<dyn PersistenceService>) -> Self {
        let config_service = ConfigOperationService::new(persistence.clone())
            .with_max_content(configuration.max_content());

        Self {
            config_service,
            sync_service: ConfigSyncService::new(persistence.clone()),
            history_service: HistoryService::new(persistence.clone()),
            namespace_service: NamespaceService::new(persistence.clone()),
            migrate_service: ConfigMigrateService::new(
                persistence.clone(),
                configuration.migrate_settings(),
            ),
            persistence,
            configuration,
        }
    }
}
