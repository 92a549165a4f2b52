//! Gray config persistence trait

use async_trait::async_trait;

use crate::model::{ConfigGrayStorageData, ConfigInfo, ConfigKey, ConfigOperateResult, Page};

/// Gray configuration persistence operations
///
/// A gray row is identified by its key plus `gray_name` and carries an opaque
/// `gray_rule`. Mutations record history with publish type `gray`.
#[async_trait]
pub trait GrayPersistence: Send + Sync {
    async fn gray_find_one(
        &self,
        key: &ConfigKey,
        gray_name: &str,
    ) -> anyhow::Result<Option<ConfigGrayStorageData>>;

    /// Fails with `QuinceError::UniquenessConflict` when the key and gray name already exist
    async fn gray_insert(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Overwrite content and rule of an existing gray row
    async fn gray_update(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Overwrite content only if the stored rule equals `gray_rule` and the
    /// stored md5 equals `info.md5` (or is null or empty)
    async fn gray_update_cas(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Overwrite content and rule only if the stored md5 equals `info.md5`
    /// (or is null or empty), whatever rule is stored
    async fn gray_update_cas_rule(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn gray_upsert(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn gray_upsert_cas(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn gray_remove(
        &self,
        key: &ConfigKey,
        gray_name: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool>;

    /// Gray names defined for a key
    async fn gray_find_names(&self, key: &ConfigKey) -> anyhow::Result<Vec<String>>;

    async fn gray_count(&self) -> anyhow::Result<u64>;

    async fn gray_find_all(
        &self,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigGrayStorageData>>;
}
