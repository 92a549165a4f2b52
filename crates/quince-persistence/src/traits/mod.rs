//! Persistence traits for the storage abstraction layer
//!
//! Each trait covers one table family. `PersistenceService` bundles them for
//! callers that need the whole store.

pub mod beta;
pub mod config;
pub mod gray;
pub mod history;
pub mod migrate;
pub mod tag;
pub mod tenant;

pub use beta::BetaPersistence;
pub use config::ConfigPersistence;
pub use gray::GrayPersistence;
pub use history::HistoryPersistence;
pub use migrate::MigratePersistence;
pub use tag::TagPersistence;
pub use tenant::TenantPersistence;

use async_trait::async_trait;

use crate::model::StorageMode;

/// Unified persistence service trait
///
/// This is the main interface for all storage operations.
#[async_trait]
pub trait PersistenceService:
    ConfigPersistence
    + BetaPersistence
    + TagPersistence
    + GrayPersistence
    + HistoryPersistence
    + MigratePersistence
    + TenantPersistence
    + Send
    + Sync
{
    /// Get the current storage mode
    fn storage_mode(&self) -> StorageMode;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
