//! Tag config persistence trait

use async_trait::async_trait;

use crate::model::{ConfigInfo, ConfigKey, ConfigOperateResult, ConfigTagStorageData, Page};

/// Tag configuration persistence operations
///
/// A tag row is content served to clients that ask for a named tag. Tag rows
/// are not audited.
#[async_trait]
pub trait TagPersistence: Send + Sync {
    async fn tag_find_one(
        &self,
        key: &ConfigKey,
        tag: &str,
    ) -> anyhow::Result<Option<ConfigTagStorageData>>;

    /// Fails with `QuinceError::UniquenessConflict` when the key and tag already exist
    async fn tag_insert(
        &self,
        info: &ConfigInfo,
        tag: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn tag_update(
        &self,
        info: &ConfigInfo,
        tag: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn tag_upsert(
        &self,
        info: &ConfigInfo,
        tag: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn tag_remove(&self, key: &ConfigKey, tag: &str) -> anyhow::Result<bool>;

    async fn tag_count(&self) -> anyhow::Result<u64>;

    async fn tag_find_all(
        &self,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigTagStorageData>>;
}
