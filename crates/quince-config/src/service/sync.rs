//! Cross-tenant config sync
//!
//! One call copies a base or gray config from a source tenant into a target
//! tenant, or removes the target when the source is gone. Writes into the
//! target are ordinary repository writes, guarded by the target fingerprint
//! read at the start of the call. Afterwards both sides are re-read: a source
//! that changed meanwhile, or a target that does not hold the source content,
//! is reported as `QuinceError::SyncConflict`. Conflicts are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use quince_common::QuinceError;
use quince_persistence::{
    ConfigAdvanceInfo, ConfigGrayStorageData, ConfigInfo, ConfigKey, ConfigOperateResult,
    ConfigPersistence, ConfigStorageData, GrayPersistence, PersistenceService,
};

use super::is_uniqueness_conflict;
use crate::model::SyncOutcome;

/// Values that must match between source and target after a copy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncFingerprint {
    pub md5: String,
    pub rule: String,
}

/// One kind of row that can be synced across tenants
#[async_trait]
pub trait SyncStore: Send + Sync {
    type Record: Send + Sync;

    async fn find(&self, key: &ConfigKey) -> anyhow::Result<Option<Self::Record>>;

    /// Write `source` into `target_key`; an existing target is only overwritten
    /// while it still matches `target`
    async fn copy(
        &self,
        source: &Self::Record,
        target_key: &ConfigKey,
        target: Option<&Self::Record>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult>;

    async fn remove(
        &self,
        key: &ConfigKey,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool>;

    /// Epoch milliseconds of the last modification
    fn modified_time(&self, record: &Self::Record) -> i64;

    fn fingerprint(&self, record: &Self::Record) -> SyncFingerprint;
}

/// Base configs
pub struct BaseSyncStore {
    persistence: Arc<dyn PersistenceService>,
}

impl BaseSyncStore {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }
}

#[async_trait]
impl SyncStore for BaseSyncStore {
    type Record = ConfigStorageData;

    async fn find(&self, key: &ConfigKey) -> anyhow::Result<Option<ConfigStorageData>> {
        self.persistence.config_find_one(key).await
    }

    async fn copy(
        &self,
        source: &ConfigStorageData,
        target_key: &ConfigKey,
        target: Option<&ConfigStorageData>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let info = ConfigInfo {
            key: target_key.clone(),
            content: source.content.clone(),
            app_name: Some(source.app_name.clone()),
            encrypted_data_key: source.encrypted_data_key.clone(),
            md5: Some(target.map(|t| t.md5.clone()).unwrap_or_default()),
        };
        let advance = ConfigAdvanceInfo {
            desc: Some(source.desc.clone()),
            r#use: Some(source.r#use.clone()),
            effect: Some(source.effect.clone()),
            r#type: Some(source.config_type.clone()),
            schema: Some(source.schema.clone()),
            config_tags: Some(source.config_tags.clone()),
        };

        self.persistence
            .config_upsert_cas(&info, Some(&advance), src_ip, src_user)
            .await
    }

    async fn remove(
        &self,
        key: &ConfigKey,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool> {
        self.persistence.config_remove(key, src_ip, src_user).await
    }

    fn modified_time(&self, record: &ConfigStorageData) -> i64 {
        record.modified_time
    }

    fn fingerprint(&self, record: &ConfigStorageData) -> SyncFingerprint {
        SyncFingerprint {
            md5: record.md5.clone(),
            rule: String::new(),
        }
    }
}

/// Gray configs of one gray name
pub struct GraySyncStore {
    persistence: Arc<dyn PersistenceService>,
    gray_name: String,
}

impl GraySyncStore {
    pub fn new(persistence: Arc<dyn PersistenceService>, gray_name: &str) -> Self {
        Self {
            persistence,
            gray_name: gray_name.to_string(),
        }
    }
}

#[async_trait]
impl SyncStore for GraySyncStore {
    type Record = ConfigGrayStorageData;

    async fn find(&self, key: &ConfigKey) -> anyhow::Result<Option<ConfigGrayStorageData>> {
        self.persistence.gray_find_one(key, &self.gray_name).await
    }

    async fn copy(
        &self,
        source: &ConfigGrayStorageData,
        target_key: &ConfigKey,
        target: Option<&ConfigGrayStorageData>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let mut info = ConfigInfo {
            key: target_key.clone(),
            content: source.content.clone(),
            app_name: Some(source.app_name.clone()),
            encrypted_data_key: source.encrypted_data_key.clone(),
            md5: None,
        };

        match target {
            None => match self
                .persistence
                .gray_insert(&info, &self.gray_name, &source.gray_rule, src_ip, src_user)
                .await
            {
                Err(e) if is_uniqueness_conflict(&e) => Ok(ConfigOperateResult::failed()),
                result => result,
            },
            Some(target) => {
                info.md5 = Some(target.md5.clone());
                self.persistence
                    .gray_update_cas_rule(
                        &info,
                        &self.gray_name,
                        &source.gray_rule,
                        src_ip,
                        src_user,
                    )
                    .await
            }
        }
    }

    async fn remove(
        &self,
        key: &ConfigKey,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool> {
        self.persistence
            .gray_remove(key, &self.gray_name, src_ip, src_user)
            .await
    }

    fn modified_time(&self, record: &ConfigGrayStorageData) -> i64 {
        record.modified_time
    }

    fn fingerprint(&self, record: &ConfigGrayStorageData) -> SyncFingerprint {
        SyncFingerprint {
            md5: record.md5.clone(),
            rule: record.gray_rule.clone(),
        }
    }
}

fn sync_conflict(source_key: &ConfigKey, target_key: &ConfigKey, reason: &str) -> anyhow::Error {
    error!(source = %source_key, target = %target_key, reason, "config sync conflict");
    QuinceError::SyncConflict(format!(
        "{} -> tenant={}: {}",
        source_key, target_key.tenant, reason
    ))
    .into()
}

/// Sync one record from `source_key` into `target_key`
pub async fn run_sync<S: SyncStore>(
    store: &S,
    source_key: &ConfigKey,
    target_key: &ConfigKey,
    src_ip: &str,
    src_user: &str,
) -> anyhow::Result<SyncOutcome> {
    let source = store.find(source_key).await?;
    let target = store.find(target_key).await?;

    let Some(source) = source else {
        let removed = match target {
            Some(_) => store.remove(target_key, src_ip, src_user).await?,
            None => false,
        };
        if store.find(source_key).await?.is_some() {
            return Err(sync_conflict(
                source_key,
                target_key,
                "source appeared while removing target",
            ));
        }
        return Ok(if removed {
            info!(source = %source_key, target = %target_key, "synced removal");
            SyncOutcome::Removed
        } else {
            SyncOutcome::UpToDate
        });
    };

    if target
        .as_ref()
        .is_some_and(|t| store.modified_time(t) >= store.modified_time(&source))
    {
        debug!(source = %source_key, target = %target_key, "target is up to date");
        return Ok(SyncOutcome::UpToDate);
    }

    let snapshot = store.fingerprint(&source);
    let result = store
        .copy(&source, target_key, target.as_ref(), src_ip, src_user)
        .await?;
    if !result.success {
        return Err(sync_conflict(source_key, target_key, "target changed during copy"));
    }

    let source_now = store.find(source_key).await?;
    if source_now.map(|s| store.fingerprint(&s)).as_ref() != Some(&snapshot) {
        return Err(sync_conflict(source_key, target_key, "source changed during copy"));
    }
    let target_now = store.find(target_key).await?;
    if target_now.map(|t| store.fingerprint(&t)).as_ref() != Some(&snapshot) {
        return Err(sync_conflict(
            source_key,
            target_key,
            "target does not hold source content",
        ));
    }

    info!(source = %source_key, target = %target_key, "synced config");
    Ok(SyncOutcome::Copied)
}

/// Cross-tenant sync of base and gray configs
#[derive(Clone)]
pub struct ConfigSyncService {
    persistence: Arc<dyn PersistenceService>,
}

impl ConfigSyncService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    /// Sync the base config `key` into `target_tenant`
    pub async fn sync(
        &self,
        key: &ConfigKey,
        target_tenant: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<SyncOutcome> {
        let target_key = target_key(key, target_tenant)?;
        let store = BaseSyncStore::new(self.persistence.clone());
        run_sync(&store, key, &target_key, src_ip, src_user).await
    }

    /// Sync the gray config `gray_name` of `key` into `target_tenant`
    pub async fn sync_gray(
        &self,
        key: &ConfigKey,
        gray_name: &str,
        target_tenant: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<SyncOutcome> {
        let gray_name = gray_name.trim();
        if gray_name.is_empty() {
            return Err(QuinceError::IllegalArgument("grayName is required".to_string()).into());
        }
        let target_key = target_key(key, target_tenant)?;
        let store = GraySyncStore::new(self.persistence.clone(), gray_name);
        run_sync(&store, key, &target_key, src_ip, src_user).await
    }
}

fn target_key(key: &ConfigKey, target_tenant: &str) -> anyhow::Result<ConfigKey> {
    let target_key = key.with_tenant(target_tenant);
    if target_key.tenant == key.tenant {
        return Err(QuinceError::IllegalArgument(format!(
            "source and target tenant are the same: {}",
            key.tenant
        ))
        .into());
    }
    Ok(target_key)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    use quince_persistence::HistoryPersistence;

    use crate::model::ConfigPublishRequest;
    use crate::service::ConfigOperationService;
    use crate::service::test_support::{persistence, request};

    fn key(tenant: &str) -> ConfigKey {
        ConfigKey::new("app.yaml", "DEFAULT_GROUP", tenant)
    }

    fn is_sync_conflict(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<QuinceError>(),
            Some(QuinceError::SyncConflict(_))
        )
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum RaceAt {
        BeforeCopy,
        AfterCopy,
        AfterRemove,
    }

    /// Store that lets a concurrent publish land at a chosen step of a sync
    struct RacingStore<S> {
        inner: S,
        publisher: ConfigOperationService,
        race_at: RaceAt,
        racing_write: ConfigPublishRequest,
    }

    impl<S: SyncStore> RacingStore<S> {
        async fn race(&self, step: RaceAt) -> anyhow::Result<()> {
            if self.race_at == step {
                self.publisher.publish(&self.racing_write).await?;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<S: SyncStore> SyncStore for RacingStore<S> {
        type Record = S::Record;

        async fn find(&self, key: &ConfigKey) -> anyhow::Result<Option<S::Record>> {
            self.inner.find(key).await
        }

        async fn copy(
            &self,
            source: &S::Record,
            target_key: &ConfigKey,
            target: Option<&S::Record>,
            src_ip: &str,
            src_user: &str,
        ) -> anyhow::Result<ConfigOperateResult> {
            self.race(RaceAt::BeforeCopy).await?;
            let result = self
                .inner
                .copy(source, target_key, target, src_ip, src_user)
                .await?;
            self.race(RaceAt::AfterCopy).await?;
            Ok(result)
        }

        async fn remove(
            &self,
            key: &ConfigKey,
            src_ip: &str,
            src_user: &str,
        ) -> anyhow::Result<bool> {
            let removed = self.inner.remove(key, src_ip, src_user).await?;
            self.race(RaceAt::AfterRemove).await?;
            Ok(removed)
        }

        fn modified_time(&self, record: &S::Record) -> i64 {
            self.inner.modified_time(record)
        }

        fn fingerprint(&self, record: &S::Record) -> SyncFingerprint {
            self.inner.fingerprint(record)
        }
    }

    fn gray_request(tenant: &str, content: &str, rule: &str) -> ConfigPublishRequest {
        ConfigPublishRequest {
            gray_name: "canary".to_string(),
            gray_rule: rule.to_string(),
            ..request("app.yaml", tenant, content)
        }
    }

    #[tokio::test]
    async fn test_sync_copies_then_noops() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        let sync = ConfigSyncService::new(persistence.clone());

        publisher.publish(&request("app.yaml", "t2", "old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish(&request("app.yaml", "t1", "v1")).await.unwrap();

        let outcome = sync.sync(&key("t1"), "t2", "10.0.0.9", "sync").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Copied);

        let target = persistence.config_find_one(&key("t2")).await.unwrap().unwrap();
        assert_eq!(target.content, "v1");
        assert_eq!(target.app_name, "quince-app");

        let outcome = sync.sync(&key("t1"), "t2", "10.0.0.9", "sync").await.unwrap();
        assert_eq!(outcome, SyncOutcome::UpToDate);

        let history = persistence
            .history_search_page(&key("t2"), 1, 10)
            .await
            .unwrap();
        assert_eq!(history.total_count, 2);
        assert_eq!(history.page_items[0].op_type, "U");
        assert_eq!(history.page_items[0].content, "old");
    }

    #[tokio::test]
    async fn test_sync_into_absent_target_inserts() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        let sync = ConfigSyncService::new(persistence.clone());

        publisher.publish(&request("app.yaml", "t1", "v1")).await.unwrap();
        let outcome = sync.sync(&key("t1"), "t2", "", "").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Copied);
        assert_eq!(
            persistence
                .config_find_one(&key("t2"))
                .await
                .unwrap()
                .unwrap()
                .md5,
            quince_common::md5_digest("v1")
        );
    }

    #[tokio::test]
    async fn test_sync_conflict_when_source_changes() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());

        publisher.publish(&request("app.yaml", "t2", "old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish(&request("app.yaml", "t1", "v1")).await.unwrap();

        let store = RacingStore {
            inner: BaseSyncStore::new(persistence.clone()),
            publisher,
            race_at: RaceAt::AfterCopy,
            racing_write: request("app.yaml", "t1", "v2"),
        };
        let err = run_sync(&store, &key("t1"), &key("t2"), "", "")
            .await
            .unwrap_err();
        assert!(is_sync_conflict(&err));
    }

    #[tokio::test]
    async fn test_sync_conflict_when_source_reappears_during_removal() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        publisher.publish(&request("app.yaml", "t2", "old")).await.unwrap();

        let store = RacingStore {
            inner: BaseSyncStore::new(persistence.clone()),
            publisher,
            race_at: RaceAt::AfterRemove,
            racing_write: request("app.yaml", "t1", "v1"),
        };
        let err = run_sync(&store, &key("t1"), &key("t2"), "", "")
            .await
            .unwrap_err();
        assert!(is_sync_conflict(&err));
        assert!(persistence.config_find_one(&key("t2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_gray_conflict_on_concurrent_target_insert() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        publisher
            .publish(&gray_request("t1", "v1", "rule"))
            .await
            .unwrap();

        let store = RacingStore {
            inner: GraySyncStore::new(persistence.clone(), "canary"),
            publisher,
            race_at: RaceAt::BeforeCopy,
            racing_write: gray_request("t2", "other", "other-rule"),
        };
        let err = run_sync(&store, &key("t1"), &key("t2"), "", "")
            .await
            .unwrap_err();
        assert!(is_sync_conflict(&err));

        let target = persistence
            .gray_find_one(&key("t2"), "canary")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.content, "other");
        assert_eq!(target.gray_rule, "other-rule");
    }

    #[tokio::test]
    async fn test_sync_gray_conflict_when_source_changes() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());

        publisher
            .publish(&gray_request("t2", "old", "rule"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher
            .publish(&gray_request("t1", "v1", "rule"))
            .await
            .unwrap();

        let store = RacingStore {
            inner: GraySyncStore::new(persistence.clone(), "canary"),
            publisher,
            race_at: RaceAt::AfterCopy,
            racing_write: gray_request("t1", "v1", "new-rule"),
        };
        let err = run_sync(&store, &key("t1"), &key("t2"), "", "")
            .await
            .unwrap_err();
        assert!(is_sync_conflict(&err));
    }

    #[tokio::test]
    async fn test_sync_removes_target_when_source_absent() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        let sync = ConfigSyncService::new(persistence.clone());

        publisher.publish(&request("app.yaml", "t2", "old")).await.unwrap();
        let outcome = sync.sync(&key("t1"), "t2", "", "").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Removed);
        assert!(persistence.config_find_one(&key("t2")).await.unwrap().is_none());

        let outcome = sync.sync(&key("t1"), "t2", "", "").await.unwrap();
        assert_eq!(outcome, SyncOutcome::UpToDate);
    }

    #[tokio::test]
    async fn test_sync_gray_copies_rule() {
        let persistence = persistence().await;
        let publisher = ConfigOperationService::new(persistence.clone());
        let sync = ConfigSyncService::new(persistence.clone());

        let mut target = request("app.yaml", "t2", "old");
        target.gray_name = "canary".to_string();
        target.gray_rule = "old-rule".to_string();
        publisher.publish(&target).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut source = request("app.yaml", "t1", "v1");
        source.gray_name = "canary".to_string();
        source.gray_rule = "new-rule".to_string();
        publisher.publish(&source).await.unwrap();

        let outcome = sync
            .sync_gray(&key("t1"), "canary", "t2", "", "")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Copied);

        let copied = persistence
            .gray_find_one(&key("t2"), "canary")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(copied.content, "v1");
        assert_eq!(copied.gray_rule, "new-rule");
    }

    #[tokio::test]
    async fn test_sync_rejects_same_tenant() {
        let persistence = persistence().await;
        let sync = ConfigSyncService::new(persistence);
        let err = sync.sync(&key("t1"), "t1", "", "").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QuinceError>(),
            Some(QuinceError::IllegalArgument(_))
        ));
        assert!(sync.sync_gray(&key("t1"), " ", "t2", "", "").await.is_err());
    }
}
