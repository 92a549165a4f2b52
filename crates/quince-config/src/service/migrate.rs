//! Namespace and gray model migration
//!
//! The blank tenant and `public` name the same namespace. Migration mirrors
//! configs between them: missing rows are bulk copied into `public`, rows that
//! differ are reconciled one key at a time through [`run_sync`]. Rows written
//! by the migration carry [`NAMESPACE_MIGRATE_SRC_USER`] so later runs can tell
//! copies from user edits. Keys edited by users on both sides are conflicts and
//! stop the run before anything is written.
//!
//! Beta and tag configs are also folded into gray configs named `beta` and
//! `tag_<tag>`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use quince_common::QuinceError;
use quince_persistence::{
    BetaPersistence, ConfigBetaStorageData, ConfigInfo, ConfigKey, ConfigTagStorageData,
    GrayPersistence, MigratePersistence, PersistenceService, TagPersistence,
};

use super::sync::{BaseSyncStore, GraySyncStore, run_sync};
use crate::model::{DEFAULT_NAMESPACE_ID, SyncOutcome};

pub const NAMESPACE_MIGRATE_SRC_USER: &str = "quince_namespace_migrate";
pub const AUTO_MIGRATE_SRC_USER: &str = "quince_auto_migrate";
const MIGRATE_SRC_IP: &str = "127.0.0.1";

pub const BETA_GRAY_NAME: &str = "beta";
const TAG_GRAY_TYPE: &str = "tag";
const GRAY_RULE_VERSION: &str = "1.0.0";
const BETA_GRAY_PRIORITY: i32 = i32::MAX;
const TAG_GRAY_PRIORITY: i32 = i32::MAX - 1;
const GRAY_MIGRATE_PAGE_SIZE: u64 = 100;

/// Gray name a tag config migrates into
pub fn tag_gray_name(tag: &str) -> String {
    format!("{}_{}", TAG_GRAY_TYPE, tag)
}

/// Serialized form of a gray rule
#[derive(Debug, Serialize)]
struct GrayRuleInfo<'a> {
    r#type: &'a str,
    version: &'a str,
    expr: &'a str,
    priority: i32,
}

impl<'a> GrayRuleInfo<'a> {
    fn new(r#type: &'a str, expr: &'a str, priority: i32) -> Self {
        Self {
            r#type,
            version: GRAY_RULE_VERSION,
            expr,
            priority,
        }
    }

    fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Clone, Debug)]
pub struct MigrateSettings {
    /// Rows read per page
    pub batch_size: u64,
    /// Extra attempts after a failed step
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl Default for MigrateSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// What a namespace migration did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrateReport {
    pub inserted: u64,
    pub updated: u64,
    pub gray_inserted: u64,
    pub gray_updated: u64,
    /// Keys left behind after their retries ran out
    pub skipped: u64,
}

#[derive(Clone, Copy, Debug)]
enum MigrateTable {
    Config,
    Gray,
}

impl MigrateTable {
    fn name(self) -> &'static str {
        match self {
            MigrateTable::Config => "config_info",
            MigrateTable::Gray => "config_info_gray",
        }
    }
}

/// Counterpart tenant of `tenant`, if it takes part in the migration
fn counterpart(tenant: &str) -> Option<&'static str> {
    if tenant.trim().is_empty() {
        Some(DEFAULT_NAMESPACE_ID)
    } else if tenant == DEFAULT_NAMESPACE_ID {
        Some("")
    } else {
        None
    }
}

fn gray_info(
    key: ConfigKey,
    content: &str,
    app_name: &str,
    encrypted_data_key: &str,
) -> ConfigInfo {
    ConfigInfo {
        app_name: Some(app_name.to_string()),
        encrypted_data_key: encrypted_data_key.to_string(),
        ..ConfigInfo::new(key, content)
    }
}

#[derive(Clone)]
pub struct ConfigMigrateService {
    persistence: Arc<dyn PersistenceService>,
    settings: MigrateSettings,
}

impl ConfigMigrateService {
    pub fn new(persistence: Arc<dyn PersistenceService>, settings: MigrateSettings) -> Self {
        Self {
            persistence,
            settings,
        }
    }

    /// Run `op`, retrying failures up to the configured limit
    async fn retry<T, F, Fut>(&self, step: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    error!(step, attempt, error = %e, "namespace migrate step failed");
                    if attempt >= self.settings.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_interval).await;
                }
            }
        }
    }

    /// Mirror every config and gray config between the blank tenant and `public`
    pub async fn namespace_migrate(&self) -> anyhow::Result<MigrateReport> {
        self.check_conflicts(MigrateTable::Config).await?;
        self.check_conflicts(MigrateTable::Gray).await?;

        let mut report = MigrateReport::default();

        report.inserted = self.insert_missing(MigrateTable::Config).await?;
        for (source, target) in [("", DEFAULT_NAMESPACE_ID), (DEFAULT_NAMESPACE_ID, "")] {
            self.update_configs(source, target, &mut report).await?;
        }

        report.gray_inserted = self.insert_missing(MigrateTable::Gray).await?;
        for (source, target) in [("", DEFAULT_NAMESPACE_ID), (DEFAULT_NAMESPACE_ID, "")] {
            self.update_grays(source, target, &mut report).await?;
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            gray_inserted = report.gray_inserted,
            gray_updated = report.gray_updated,
            skipped = report.skipped,
            "namespace migrate finished"
        );
        Ok(report)
    }

    async fn check_conflicts(&self, table: MigrateTable) -> anyhow::Result<()> {
        let persistence = self.persistence.as_ref();
        self.retry("pre check", move || async move {
            let count = match table {
                MigrateTable::Config => {
                    persistence
                        .config_conflict_count("", DEFAULT_NAMESPACE_ID, NAMESPACE_MIGRATE_SRC_USER)
                        .await?
                }
                MigrateTable::Gray => {
                    persistence
                        .gray_conflict_count("", DEFAULT_NAMESPACE_ID, NAMESPACE_MIGRATE_SRC_USER)
                        .await?
                }
            };
            if count > 0 {
                return Err(QuinceError::SyncConflict(format!(
                    "{} keys edited in both namespaces of {}",
                    count,
                    table.name()
                ))
                .into());
            }
            Ok::<(), anyhow::Error>(())
        })
        .await
    }

    /// Bulk copy blank tenant rows that `public` lacks
    async fn insert_missing(&self, table: MigrateTable) -> anyhow::Result<u64> {
        let persistence = self.persistence.as_ref();
        let batch_size = self.settings.batch_size.max(1);
        let mut start_id = 0;
        let mut total = 0;

        loop {
            let (ids, copied) = self
                .retry("insert", move || async move {
                    let ids = match table {
                        MigrateTable::Config => {
                            persistence
                                .config_migrate_insert_ids(
                                    "",
                                    DEFAULT_NAMESPACE_ID,
                                    start_id,
                                    batch_size,
                                )
                                .await?
                        }
                        MigrateTable::Gray => {
                            persistence
                                .gray_migrate_insert_ids(
                                    "",
                                    DEFAULT_NAMESPACE_ID,
                                    start_id,
                                    batch_size,
                                )
                                .await?
                        }
                    };
                    let copied = match table {
                        MigrateTable::Config => {
                            persistence
                                .config_migrate_insert_by_ids(
                                    &ids,
                                    DEFAULT_NAMESPACE_ID,
                                    MIGRATE_SRC_IP,
                                    NAMESPACE_MIGRATE_SRC_USER,
                                )
                                .await?
                        }
                        MigrateTable::Gray => {
                            persistence
                                .gray_migrate_insert_by_ids(
                                    &ids,
                                    DEFAULT_NAMESPACE_ID,
                                    MIGRATE_SRC_IP,
                                    NAMESPACE_MIGRATE_SRC_USER,
                                )
                                .await?
                        }
                    };
                    Ok::<_, anyhow::Error>((ids, copied))
                })
                .await?;

            total += copied;
            let Some(&last) = ids.last() else { break };
            start_id = last;
            if (ids.len() as u64) < batch_size {
                break;
            }
        }

        info!(table = table.name(), copied = total, "namespace migrate insert done");
        Ok(total)
    }

    async fn update_configs(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        report: &mut MigrateReport,
    ) -> anyhow::Result<()> {
        let persistence = self.persistence.as_ref();
        let store = BaseSyncStore::new(self.persistence.clone());
        let batch_size = self.settings.batch_size.max(1);
        let mut start_id = 0;

        loop {
            let page = self
                .retry("update list", move || {
                    persistence.config_migrate_update_list(
                        source_tenant,
                        target_tenant,
                        start_id,
                        batch_size,
                        NAMESPACE_MIGRATE_SRC_USER,
                    )
                })
                .await?;

            for record in &page {
                let key = ConfigKey::new(&record.data_id, &record.group, source_tenant);
                let target_key = key.with_tenant(target_tenant);
                let synced = self
                    .retry("update", || {
                        run_sync(
                            &store,
                            &key,
                            &target_key,
                            MIGRATE_SRC_IP,
                            NAMESPACE_MIGRATE_SRC_USER,
                        )
                    })
                    .await;
                match synced {
                    Ok(SyncOutcome::UpToDate) => {}
                    Ok(_) => report.updated += 1,
                    Err(e) => {
                        warn!(
                            key = %key,
                            target = target_tenant,
                            error = %e,
                            "namespace migrate update skipped"
                        );
                        report.skipped += 1;
                    }
                }
            }

            let Some(last) = page.last() else { break };
            start_id = last.id;
            if (page.len() as u64) < batch_size {
                break;
            }
        }

        Ok(())
    }

    async fn update_grays(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        report: &mut MigrateReport,
    ) -> anyhow::Result<()> {
        let persistence = self.persistence.as_ref();
        let batch_size = self.settings.batch_size.max(1);
        let mut start_id = 0;

        loop {
            let page = self
                .retry("gray update list", move || {
                    persistence.gray_migrate_update_list(
                        source_tenant,
                        target_tenant,
                        start_id,
                        batch_size,
                        NAMESPACE_MIGRATE_SRC_USER,
                    )
                })
                .await?;

            for record in &page {
                let key = ConfigKey::new(&record.data_id, &record.group, source_tenant);
                let target_key = key.with_tenant(target_tenant);
                let store = GraySyncStore::new(self.persistence.clone(), &record.gray_name);
                let synced = self
                    .retry("gray update", || {
                        run_sync(
                            &store,
                            &key,
                            &target_key,
                            MIGRATE_SRC_IP,
                            NAMESPACE_MIGRATE_SRC_USER,
                        )
                    })
                    .await;
                match synced {
                    Ok(SyncOutcome::UpToDate) => {}
                    Ok(_) => report.gray_updated += 1,
                    Err(e) => {
                        warn!(
                            key = %key,
                            gray_name = %record.gray_name,
                            target = target_tenant,
                            error = %e,
                            "namespace migrate gray update skipped"
                        );
                        report.skipped += 1;
                    }
                }
            }

            let Some(last) = page.last() else { break };
            start_id = last.id;
            if (page.len() as u64) < batch_size {
                break;
            }
        }

        Ok(())
    }

    /// Mirror one base config into the counterpart namespace
    ///
    /// Returns `None` for tenants outside the blank/`public` pair.
    pub async fn namespace_migrate_config(
        &self,
        key: &ConfigKey,
    ) -> anyhow::Result<Option<SyncOutcome>> {
        let Some(target_tenant) = counterpart(&key.tenant) else {
            return Ok(None);
        };
        let store = BaseSyncStore::new(self.persistence.clone());
        let outcome = run_sync(
            &store,
            key,
            &key.with_tenant(target_tenant),
            MIGRATE_SRC_IP,
            NAMESPACE_MIGRATE_SRC_USER,
        )
        .await?;
        Ok(Some(outcome))
    }

    /// Mirror one gray config into the counterpart namespace
    pub async fn namespace_migrate_gray(
        &self,
        key: &ConfigKey,
        gray_name: &str,
    ) -> anyhow::Result<Option<SyncOutcome>> {
        let Some(target_tenant) = counterpart(&key.tenant) else {
            return Ok(None);
        };
        let store = GraySyncStore::new(self.persistence.clone(), gray_name);
        let outcome = run_sync(
            &store,
            key,
            &key.with_tenant(target_tenant),
            MIGRATE_SRC_IP,
            NAMESPACE_MIGRATE_SRC_USER,
        )
        .await?;
        Ok(Some(outcome))
    }

    /// Bring the `beta` gray config of `key` in line with its beta config
    ///
    /// Returns whether the gray config was written or removed.
    pub async fn check_migrate_beta(&self, key: &ConfigKey) -> anyhow::Result<bool> {
        match self.persistence.beta_find_one(key).await? {
            Some(beta) => self.migrate_beta(&beta).await,
            None => self.remove_stale_gray(key, BETA_GRAY_NAME).await,
        }
    }

    /// Bring the `tag_<tag>` gray config of `key` in line with its tag config
    pub async fn check_migrate_tag(&self, key: &ConfigKey, tag: &str) -> anyhow::Result<bool> {
        match self.persistence.tag_find_one(key, tag).await? {
            Some(tagged) => self.migrate_tag(&tagged).await,
            None => self.remove_stale_gray(key, &tag_gray_name(tag)).await,
        }
    }

    /// Fold every beta and tag config into gray configs
    ///
    /// Returns the number of gray configs written.
    pub async fn migrate_beta_and_tag_to_gray(&self) -> anyhow::Result<u64> {
        let mut migrated = 0;

        let mut page_no = 1;
        loop {
            let page = self
                .persistence
                .beta_find_all(page_no, GRAY_MIGRATE_PAGE_SIZE)
                .await?;
            for beta in &page.page_items {
                if self.migrate_beta(beta).await? {
                    migrated += 1;
                }
            }
            if page_no >= page.pages_available {
                break;
            }
            page_no += 1;
        }

        let mut page_no = 1;
        loop {
            let page = self
                .persistence
                .tag_find_all(page_no, GRAY_MIGRATE_PAGE_SIZE)
                .await?;
            for tagged in &page.page_items {
                if self.migrate_tag(tagged).await? {
                    migrated += 1;
                }
            }
            if page_no >= page.pages_available {
                break;
            }
            page_no += 1;
        }

        info!(migrated, "beta and tag configs migrated to gray");
        Ok(migrated)
    }

    async fn migrate_beta(&self, beta: &ConfigBetaStorageData) -> anyhow::Result<bool> {
        let key = ConfigKey::new(&beta.data_id, &beta.group, &beta.tenant);
        let gray = self.persistence.gray_find_one(&key, BETA_GRAY_NAME).await?;
        if gray.is_some_and(|g| g.modified_time >= beta.modified_time) {
            return Ok(false);
        }

        info!(key = %key, md5 = %beta.md5, "migrating beta to gray");
        let rule = GrayRuleInfo::new(BETA_GRAY_NAME, &beta.beta_ips, BETA_GRAY_PRIORITY).to_json()?;
        let info = gray_info(key, &beta.content, &beta.app_name, &beta.encrypted_data_key);
        self.persistence
            .gray_upsert(&info, BETA_GRAY_NAME, &rule, MIGRATE_SRC_IP, AUTO_MIGRATE_SRC_USER)
            .await?;
        Ok(true)
    }

    async fn migrate_tag(&self, tagged: &ConfigTagStorageData) -> anyhow::Result<bool> {
        let key = ConfigKey::new(&tagged.data_id, &tagged.group, &tagged.tenant);
        let gray_name = tag_gray_name(&tagged.tag);
        let gray = self.persistence.gray_find_one(&key, &gray_name).await?;
        if gray.is_some_and(|g| g.modified_time >= tagged.modified_time) {
            return Ok(false);
        }

        info!(key = %key, tag = %tagged.tag, md5 = %tagged.md5, "migrating tag to gray");
        let rule = GrayRuleInfo::new(TAG_GRAY_TYPE, &tagged.tag, TAG_GRAY_PRIORITY).to_json()?;
        let info = gray_info(key, &tagged.content, &tagged.app_name, &tagged.encrypted_data_key);
        self.persistence
            .gray_upsert(&info, &gray_name, &rule, MIGRATE_SRC_IP, AUTO_MIGRATE_SRC_USER)
            .await?;
        Ok(true)
    }

    async fn remove_stale_gray(&self, key: &ConfigKey, gray_name: &str) -> anyhow::Result<bool> {
        if self.persistence.gray_find_one(key, gray_name).await?.is_none() {
            return Ok(false);
        }
        info!(key = %key, gray_name, "removing gray config left by a deleted source");
        self.persistence
            .gray_remove(key, gray_name, MIGRATE_SRC_IP, AUTO_MIGRATE_SRC_USER)
            .await
    }
}
