//! Quince Config - Configuration management services
//!
//! This crate provides:
//! - Publishing of base, beta, tag and gray configs, with CAS variants
//! - Removal, lookup and search
//! - Batch import with a same-config policy
//! - Cross-tenant sync and namespace migration
//! - History retention and namespace management

pub mod model;
pub mod service;
pub mod validation;

// Re-export commonly used types
pub use model::*;
pub use service::{
    ConfigMigrateService, ConfigOperationService, ConfigSyncService, HistoryService,
    MigrateReport, MigrateSettings, NamespaceService,
};
