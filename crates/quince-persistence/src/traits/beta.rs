//! Beta config persistence trait

use async_trait::async_trait;

use crate::model::{ConfigBetaStorageData, ConfigInfo, ConfigKey, ConfigOperateResult, Page};

/// Beta configuration persistence operations
///
/// Beta rows carry content served to a list of client IPs. They are not audited.
#[async_trait]
pub trait BetaPersistence: Send + Sync {
    async fn beta_find_one(&self, key: &ConfigKey)
    -> anyhow::Result<Option<ConfigBetaStorageData>>;

    /// Fails with `QuinceError::UniquenessConflict` when the key already exists
    async fn beta_insert(
        &self,
        info: &ConfigInfo,
        beta_ips: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn beta_update(
        &self,
        info: &ConfigInfo,
        beta_ips: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn beta_upsert(
        &self,
        info: &ConfigInfo,
        beta_ips: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn beta_remove(&self, key: &ConfigKey) -> anyhow::Result<bool>;

    async fn beta_count(&self) -> anyhow::Result<u64>;

    async fn beta_find_all(
        &self,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigBetaStorageData>>;
}
