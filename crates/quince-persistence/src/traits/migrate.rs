//! Namespace migration persistence trait

use async_trait::async_trait;

use crate::model::{ConfigGrayStorageData, ConfigStorageData};

/// Bulk reads and copies used to mirror configs between two tenants
///
/// Rows are paged by ascending id: callers pass the last id they saw as
/// `start_id` and stop once a page comes back shorter than `page_size`.
/// `migrate_user` is the `src_user` stamped on rows written by the migration.
#[async_trait]
pub trait MigratePersistence: Send + Sync {
    /// Keys present in both tenants where neither row was written by `migrate_user`
    async fn config_conflict_count(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        migrate_user: &str,
    ) -> anyhow::Result<u64>;

    async fn gray_conflict_count(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        migrate_user: &str,
    ) -> anyhow::Result<u64>;

    /// Ids of source configs after `start_id` with no row of the same key in the target tenant
    async fn config_migrate_insert_ids(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
    ) -> anyhow::Result<Vec<i64>>;

    async fn gray_migrate_insert_ids(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
    ) -> anyhow::Result<Vec<i64>>;

    /// Copy the configs `ids` into `target_tenant` in one transaction
    ///
    /// Tags are copied along and each copy records an insert history entry.
    /// Fails with `QuinceError::UniquenessConflict`, writing nothing, when any
    /// copy collides with an existing row.
    async fn config_migrate_insert_by_ids(
        &self,
        ids: &[i64],
        target_tenant: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<u64>;

    async fn gray_migrate_insert_by_ids(
        &self,
        ids: &[i64],
        target_tenant: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<u64>;

    /// Source configs after `start_id` whose target row holds other content
    ///
    /// Rows last written by `migrate_user` are copies and are left out.
    async fn config_migrate_update_list(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
        migrate_user: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Same as `config_migrate_update_list`; a differing rule also counts
    async fn gray_migrate_update_list(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
        migrate_user: &str,
    ) -> anyhow::Result<Vec<ConfigGrayStorageData>>;
}
