//! Quince Persistence - Database entities and persistence layer
//!
//! This crate provides:
//! - SeaORM entity definitions for the config, variant, history and tenant tables
//! - Persistence trait abstractions over the storage backend
//! - Query builders for paginated and key-set searches
//! - The SQL adapter (MySQL/PostgreSQL/SQLite via SeaORM)

pub mod entity;
pub mod model;
pub mod query;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export persistence traits
pub use traits::{
    BetaPersistence, ConfigPersistence, GrayPersistence, HistoryPersistence, MigratePersistence,
    PersistenceService, TagPersistence, TenantPersistence,
};

// Re-export SQL backend
pub use sql::ExternalDbPersistService;

// Re-export model types
pub use model::{
    ConfigAdvanceInfo, ConfigBetaStorageData, ConfigGrayStorageData, ConfigHistoryStorageData,
    ConfigInfo, ConfigKey, ConfigOperateResult, ConfigStorageData, ConfigTagStorageData, Page,
    StorageMode, TenantStorageData,
};

// Re-export query types
pub use query::{ConfigKeyFilter, ConfigSearchFilter, SearchMode};
