//! Config history service
//!
//! Read access to the history of a key and time based retention.

use std::sync::Arc;

use tracing::info;

use quince_persistence::{
    ConfigHistoryStorageData, ConfigKey, HistoryPersistence, Page, PersistenceService,
};

#[derive(Clone)]
pub struct HistoryService {
    persistence: Arc<dyn PersistenceService>,
}

impl HistoryService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    /// History of a key, newest first
    pub async fn search_page(
        &self,
        key: &ConfigKey,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigHistoryStorageData>> {
        self.persistence
            .history_search_page(key, page_no, page_size)
            .await
    }

    pub async fn find_by_nid(&self, nid: i64) -> anyhow::Result<Option<ConfigHistoryStorageData>> {
        self.persistence.history_find_by_nid(nid).await
    }

    /// Entry before `nid` for the same config
    pub async fn find_previous(
        &self,
        id: i64,
        nid: i64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>> {
        self.persistence.history_find_previous(id, nid).await
    }

    /// Delete entries older than `retention_days`, `batch_size` rows at a time
    ///
    /// Returns the number of deleted entries.
    pub async fn cleanup_expired(&self, retention_days: u32, batch_size: u64) -> anyhow::Result<u64> {
        let cutoff = chrono::Utc::now().naive_utc()
            - chrono::Duration::days(i64::from(retention_days));
        let batch_size = batch_size.max(1);

        let mut total = 0;
        loop {
            let removed = self
                .persistence
                .history_remove_before(cutoff, batch_size)
                .await?;
            total += removed;
            if removed < batch_size {
                break;
            }
        }

        if total > 0 {
            info!(retention_days, removed = total, "expired config history cleaned up");
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::service::ConfigOperationService;
    use crate::service::test_support::{persistence, request};

    #[tokio::test]
    async fn test_search_and_previous() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        let history = HistoryService::new(persistence);

        publisher.publish(&request("app.yaml", "", "v1")).await.unwrap();
        publisher.publish(&request("app.yaml", "", "v2")).await.unwrap();

        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "");
        let page = history.search_page(&key, 1, 10).await.unwrap();
        assert_eq!(page.total_count, 2);

        let latest = &page.page_items[0];
        let found = history.find_by_nid(latest.nid).await.unwrap().unwrap();
        assert_eq!(found.op_type, "U");

        let previous = history
            .find_previous(latest.id, latest.nid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.op_type, "I");
        assert_eq!(previous.content, "v1");
    }

    #[tokio::test]
    async fn test_cleanup_expired_keeps_recent_entries() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        let history = HistoryService::new(persistence);

        for i in 0..3 {
            publisher
                .publish(&request("app.yaml", "", &format!("v{}", i)))
                .await
                .unwrap();
        }

        assert_eq!(history.cleanup_expired(30, 2).await.unwrap(), 0);
        // zero days moves the cutoff to now
        assert_eq!(history.cleanup_expired(0, 2).await.unwrap(), 3);

        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "");
        assert_eq!(history.search_page(&key, 1, 10).await.unwrap().total_count, 0);
    }
}
