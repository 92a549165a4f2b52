//! Config persistence trait
//!
//! Defines the interface for base configuration storage operations.

use async_trait::async_trait;

use crate::model::{
    ConfigAdvanceInfo, ConfigInfo, ConfigKey, ConfigOperateResult, ConfigStorageData, Page,
};
use crate::query::{ConfigKeyFilter, ConfigSearchFilter};

/// Base configuration persistence operations
///
/// Every mutation records a history entry in the same transaction.
#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    /// Find a single config with its tags
    async fn config_find_one(&self, key: &ConfigKey) -> anyhow::Result<Option<ConfigStorageData>>;

    /// Find a config by its numeric id
    async fn config_find_by_id(&self, id: i64) -> anyhow::Result<Option<ConfigStorageData>>;

    /// Find configs by numeric ids, missing ids are skipped
    async fn config_find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Insert a new config
    ///
    /// Fails with `QuinceError::UniquenessConflict` when the key already exists.
    async fn config_insert(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Overwrite an existing config
    async fn config_update(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Overwrite an existing config only if its md5 equals `info.md5`
    ///
    /// A stored md5 that is null or empty also matches.
    async fn config_update_cas(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Insert, or update when the key already exists
    async fn config_upsert(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Insert, or CAS update when the key already exists
    async fn config_upsert_cas(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    /// Remove a config and its tags, returning whether a row existed
    async fn config_remove(
        &self,
        key: &ConfigKey,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool>;

    /// Remove configs by id in one transaction, returning the removed rows
    async fn config_remove_by_ids(
        &self,
        ids: &[i64],
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Search configs with pagination and filters
    async fn config_search_page(
        &self,
        filter: &ConfigSearchFilter,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>>;

    /// Search configs of a tenant against a whitelist or blacklist of keys
    async fn config_search_by_keys(
        &self,
        tenant: &str,
        keys: &[ConfigKeyFilter],
        blacklist: bool,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>>;

    /// Tag names of a config in insertion order
    async fn config_find_tags(&self, key: &ConfigKey) -> anyhow::Result<Vec<String>>;

    /// Count all configs
    async fn config_count(&self) -> anyhow::Result<u64>;

    /// Count configs in a tenant
    async fn config_count_by_tenant(&self, tenant: &str) -> anyhow::Result<u64>;

    /// Largest config id, zero when empty
    async fn config_max_id(&self) -> anyhow::Result<i64>;

    /// Find all group names in a tenant
    async fn config_find_all_group_names(&self, tenant: &str) -> anyhow::Result<Vec<String>>;
}
