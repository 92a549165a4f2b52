//! History persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::{ConfigHistoryStorageData, ConfigKey, Page};

/// Read and retention operations over the append-only history table
#[async_trait]
pub trait HistoryPersistence: Send + Sync {
    /// History of a key, newest first
    async fn history_search_page(
        &self,
        key: &ConfigKey,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigHistoryStorageData>>;

    async fn history_find_by_nid(
        &self,
        nid: i64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>>;

    /// Entry preceding `nid` for the same referenced row
    async fn history_find_previous(
        &self,
        id: i64,
        nid: i64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>>;

    /// Count entries last modified before `cutoff`
    async fn history_count_before(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64>;

    /// Remove up to `limit` of the oldest entries modified before `cutoff`
    async fn history_remove_before(
        &self,
        cutoff: NaiveDateTime,
        limit: u64,
    ) -> anyhow::Result<u64>;
}
