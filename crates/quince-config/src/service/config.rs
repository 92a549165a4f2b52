//! Config publishing service
//!
//! Dispatches publishes to the right variant table, removes and looks up
//! variants, searches base configs and imports batches.

use std::sync::Arc;

use tracing::{debug, info, warn};

use quince_common::{QuinceError, normalize_tenant, trim_or_empty};
use quince_persistence::{
    BetaPersistence, ConfigKey, ConfigKeyFilter, ConfigOperateResult, ConfigPersistence,
    ConfigSearchFilter, ConfigStorageData, GrayPersistence, Page, PersistenceService,
    TagPersistence,
};

use super::is_uniqueness_conflict;
use crate::model::{
    BatchImportResult, ConfigPublishRequest, ConfigVariant, SameConfigPolicy, VariantKind,
};
use crate::validation::{DEFAULT_MAX_CONTENT, check_publish_request};

/// Collapse a blank tenant and trim the fields that select a variant
fn normalize(req: &ConfigPublishRequest) -> ConfigPublishRequest {
    let mut req = req.clone();
    req.tenant = normalize_tenant(&req.tenant);
    req.beta_ips = trim_or_empty(&req.beta_ips);
    req.tag = trim_or_empty(&req.tag);
    req.gray_name = trim_or_empty(&req.gray_name);
    req.gray_rule = trim_or_empty(&req.gray_rule);
    req
}

#[derive(Clone)]
pub struct ConfigOperationService {
    persistence: Arc<dyn PersistenceService>,
    max_content: usize,
}

impl ConfigOperationService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self {
            persistence,
            max_content: DEFAULT_MAX_CONTENT,
        }
    }

    /// Override the maximum accepted content size in bytes
    pub fn with_max_content(mut self, max_content: usize) -> Self {
        self.max_content = max_content;
        self
    }

    /// Publish a config, inserting or overwriting the selected variant
    pub async fn publish(&self, req: &ConfigPublishRequest) -> anyhow::Result<ConfigOperateResult> {
        let req = normalize(req);
        check_publish_request(&req, self.max_content)?;

        let info = req.config_info();
        let kind = req.variant_kind();
        let result = match &kind {
            VariantKind::Beta => {
                self.persistence
                    .beta_upsert(&info, &req.beta_ips, &req.src_ip, &req.src_user)
                    .await?
            }
            VariantKind::Tag(tag) => {
                self.persistence
                    .tag_upsert(&info, tag, &req.src_ip, &req.src_user)
                    .await?
            }
            VariantKind::Gray(gray_name) => {
                self.persistence
                    .gray_upsert(&info, gray_name, &req.gray_rule, &req.src_ip, &req.src_user)
                    .await?
            }
            VariantKind::Base => {
                self.persistence
                    .config_upsert(&info, Some(&req.advance_info()), &req.src_ip, &req.src_user)
                    .await?
            }
        };

        debug!(key = %info.key, kind = %kind, success = result.success, "config published");
        Ok(result)
    }

    /// Publish only if the stored fingerprint still equals `cas_md5`
    ///
    /// Only base and gray configs support CAS. A stale fingerprint yields an
    /// unsuccessful result and leaves the stored row unchanged.
    pub async fn publish_cas(
        &self,
        req: &ConfigPublishRequest,
    ) -> anyhow::Result<ConfigOperateResult> {
        let req = normalize(req);
        check_publish_request(&req, self.max_content)?;
        if req.cas_md5.is_none() {
            return Err(QuinceError::IllegalArgument("casMd5 is required".to_string()).into());
        }

        let info = req.config_info();
        let kind = req.variant_kind();
        let result = match &kind {
            VariantKind::Gray(gray_name) => {
                self.persistence
                    .gray_upsert_cas(&info, gray_name, &req.gray_rule, &req.src_ip, &req.src_user)
                    .await?
            }
            VariantKind::Base => {
                self.persistence
                    .config_upsert_cas(&info, Some(&req.advance_info()), &req.src_ip, &req.src_user)
                    .await?
            }
            VariantKind::Beta | VariantKind::Tag(_) => {
                return Err(QuinceError::IllegalArgument(format!(
                    "cas publish is not supported for {} configs",
                    kind
                ))
                .into());
            }
        };

        if !result.success {
            info!(key = %info.key, kind = %kind, "cas publish rejected");
        }
        Ok(result)
    }

    /// Remove one variant of a key, returning whether a row existed
    pub async fn remove(
        &self,
        key: &ConfigKey,
        kind: &VariantKind,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool> {
        let removed = match kind {
            VariantKind::Base => self.persistence.config_remove(key, src_ip, src_user).await?,
            VariantKind::Beta => self.persistence.beta_remove(key).await?,
            VariantKind::Tag(tag) => self.persistence.tag_remove(key, tag).await?,
            VariantKind::Gray(gray_name) => {
                self.persistence
                    .gray_remove(key, gray_name, src_ip, src_user)
                    .await?
            }
        };

        debug!(key = %key, kind = %kind, removed, "config removed");
        Ok(removed)
    }

    /// Remove base configs by id, all or nothing
    pub async fn remove_batch(
        &self,
        ids: &[i64],
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.persistence
            .config_remove_by_ids(ids, src_ip, src_user)
            .await
    }

    pub async fn find(
        &self,
        key: &ConfigKey,
        kind: &VariantKind,
    ) -> anyhow::Result<Option<ConfigVariant>> {
        Ok(match kind {
            VariantKind::Base => self
                .persistence
                .config_find_one(key)
                .await?
                .map(ConfigVariant::Base),
            VariantKind::Beta => self
                .persistence
                .beta_find_one(key)
                .await?
                .map(ConfigVariant::Beta),
            VariantKind::Tag(tag) => self
                .persistence
                .tag_find_one(key, tag)
                .await?
                .map(ConfigVariant::Tag),
            VariantKind::Gray(gray_name) => self
                .persistence
                .gray_find_one(key, gray_name)
                .await?
                .map(ConfigVariant::Gray),
        })
    }

    pub async fn search(
        &self,
        filter: &ConfigSearchFilter,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>> {
        let filter = ConfigSearchFilter {
            tenant: normalize_tenant(&filter.tenant),
            ..filter.clone()
        };
        self.persistence
            .config_search_page(&filter, page_no, page_size)
            .await
    }

    /// Search a tenant against a whitelist, or a blacklist when `blacklist` is set
    pub async fn search_by_keys(
        &self,
        tenant: &str,
        keys: &[ConfigKeyFilter],
        blacklist: bool,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>> {
        let tenant = normalize_tenant(tenant);
        self.persistence
            .config_search_by_keys(&tenant, keys, blacklist, page_no, page_size)
            .await
    }

    /// Import base configs one transaction per record
    ///
    /// Every record is validated before anything is written. Existing keys are
    /// handled by `policy`; with `Abort` the conflicting record and all records
    /// after it are reported as failed.
    pub async fn batch_insert_or_update(
        &self,
        requests: Vec<ConfigPublishRequest>,
        policy: SameConfigPolicy,
    ) -> anyhow::Result<BatchImportResult> {
        let requests: Vec<ConfigPublishRequest> = requests.iter().map(normalize).collect();
        for req in &requests {
            check_publish_request(req, self.max_content)?;
        }

        let mut result = BatchImportResult::default();
        for (index, req) in requests.iter().enumerate() {
            let info = req.config_info();
            let advance = req.advance_info();

            match self
                .persistence
                .config_insert(&info, Some(&advance), &req.src_ip, &req.src_user)
                .await
            {
                Ok(_) => result.succ_count += 1,
                Err(e) if is_uniqueness_conflict(&e) => match policy {
                    SameConfigPolicy::Abort => {
                        warn!(key = %info.key, "import aborted on existing config");
                        result
                            .fail_data
                            .extend(requests[index..].iter().map(ConfigPublishRequest::key));
                        break;
                    }
                    SameConfigPolicy::Skip => {
                        result.skip_count += 1;
                        result.skip_data.push(info.key);
                    }
                    SameConfigPolicy::Overwrite => {
                        let updated = self
                            .persistence
                            .config_update(&info, Some(&advance), &req.src_ip, &req.src_user)
                            .await?;
                        if updated.success {
                            result.succ_count += 1;
                        } else {
                            result.fail_data.push(info.key);
                        }
                    }
                },
                Err(e) => return Err(e),
            }
        }

        info!(
            policy = %policy,
            succ_count = result.succ_count,
            skip_count = result.skip_count,
            fail_count = result.fail_data.len(),
            "config import finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quince_common::md5_digest;
    use quince_persistence::HistoryPersistence;

    use crate::service::test_support::{persistence, request};

    async fn service() -> ConfigOperationService {
        ConfigOperationService::new(persistence().await)
    }

    fn base_key(data_id: &str) -> ConfigKey {
        ConfigKey::new(data_id, "DEFAULT_GROUP", "")
    }

    fn is_illegal_argument(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<QuinceError>(),
            Some(QuinceError::IllegalArgument(_))
        )
    }

    #[tokio::test]
    async fn test_publish_find_remove_find() {
        let service = service().await;
        let published = service.publish(&request("app.yaml", "", "a=1")).await.unwrap();
        assert!(published.success);

        let found = service
            .find(&base_key("app.yaml"), &VariantKind::Base)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.md5(), md5_digest("a=1"));
        assert_eq!(found.id(), published.id);

        assert!(
            service
                .remove(&base_key("app.yaml"), &VariantKind::Base, "10.0.0.1", "alice")
                .await
                .unwrap()
        );
        assert!(
            service
                .find(&base_key("app.yaml"), &VariantKind::Base)
                .await
                .unwrap()
                .is_none()
        );

        let history = service
            .persistence
            .history_search_page(&base_key("app.yaml"), 1, 10)
            .await
            .unwrap();
        let ops: Vec<&str> = history
            .page_items
            .iter()
            .map(|h| h.op_type.as_str())
            .collect();
        assert_eq!(ops, vec!["D", "I"]);
        assert!(history.page_items.iter().all(|h| h.id == published.id));
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_noop() {
        let service = service().await;
        assert!(
            !service
                .remove(&base_key("missing"), &VariantKind::Base, "", "")
                .await
                .unwrap()
        );
        let history = service
            .persistence
            .history_search_page(&base_key("missing"), 1, 10)
            .await
            .unwrap();
        assert_eq!(history.total_count, 0);
    }

    #[tokio::test]
    async fn test_publish_dispatches_by_variant() {
        let service = service().await;

        let mut beta = request("app.yaml", "", "beta");
        beta.beta_ips = "10.0.0.2".to_string();
        beta.tag = "ignored".to_string();
        service.publish(&beta).await.unwrap();

        let mut tag = request("app.yaml", "", "blue");
        tag.tag = "blue".to_string();
        service.publish(&tag).await.unwrap();

        let mut gray = request("app.yaml", "", "gray");
        gray.gray_name = " canary ".to_string();
        gray.gray_rule = "rule".to_string();
        service.publish(&gray).await.unwrap();

        let key = base_key("app.yaml");
        assert!(
            service
                .find(&key, &VariantKind::Base)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            service
                .find(&key, &VariantKind::Beta)
                .await
                .unwrap()
                .unwrap()
                .content(),
            "beta"
        );
        assert_eq!(
            service
                .find(&key, &VariantKind::Tag("blue".to_string()))
                .await
                .unwrap()
                .unwrap()
                .content(),
            "blue"
        );
        let found = service
            .find(&key, &VariantKind::Gray("canary".to_string()))
            .await
            .unwrap()
            .unwrap();
        match found {
            ConfigVariant::Gray(g) => assert_eq!(g.gray_rule, "rule"),
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_rejects_invalid_request() {
        let service = service().await.with_max_content(8);
        let err = service
            .publish(&request("app.yaml", "", "content longer than eight"))
            .await
            .unwrap_err();
        assert!(is_illegal_argument(&err));

        let err = service
            .publish(&request("bad id", "", "a=1"))
            .await
            .unwrap_err();
        assert!(is_illegal_argument(&err));
    }

    #[tokio::test]
    async fn test_publish_cas_stale_md5_leaves_record() {
        let service = service().await;
        service.publish(&request("app.yaml", "", "v1")).await.unwrap();

        let mut stale = request("app.yaml", "", "v2");
        stale.cas_md5 = Some(md5_digest("v0"));
        assert!(!service.publish_cas(&stale).await.unwrap().success);
        assert_eq!(
            service
                .find(&base_key("app.yaml"), &VariantKind::Base)
                .await
                .unwrap()
                .unwrap()
                .content(),
            "v1"
        );

        let mut fresh = request("app.yaml", "", "v2");
        fresh.cas_md5 = Some(md5_digest("v1"));
        assert!(service.publish_cas(&fresh).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_publish_cas_requires_md5_and_supported_variant() {
        let service = service().await;
        let err = service
            .publish_cas(&request("app.yaml", "", "v1"))
            .await
            .unwrap_err();
        assert!(is_illegal_argument(&err));

        let mut tag = request("app.yaml", "", "v1");
        tag.tag = "blue".to_string();
        tag.cas_md5 = Some(String::new());
        let err = service.publish_cas(&tag).await.unwrap_err();
        assert!(is_illegal_argument(&err));
    }

    #[tokio::test]
    async fn test_concurrent_publish_cas_single_winner() {
        let service = service().await;
        service.publish(&request("app.yaml", "", "v1")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let mut req = request("app.yaml", "", &format!("v2-{}", i));
                req.cas_md5 = Some(md5_digest("v1"));
                service.publish_cas(&req).await.unwrap().success
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_remove_batch_and_search() {
        let service = service().await;
        let a = service.publish(&request("a.yaml", "", "a")).await.unwrap();
        let b = service.publish(&request("b.yaml", "", "b")).await.unwrap();
        service.publish(&request("c.yaml", "", "c")).await.unwrap();

        let removed = service
            .remove_batch(&[a.id, b.id], "", "")
            .await
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert!(service.remove_batch(&[], "", "").await.unwrap().is_empty());

        let page = service
            .search(&ConfigSearchFilter::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.page_items[0].data_id, "c.yaml");

        let blacklist = service
            .search_by_keys("", &[], true, 1, 10)
            .await
            .unwrap();
        assert_eq!(blacklist.total_count, 0);
    }

    #[tokio::test]
    async fn test_blank_tenant_publishes_into_default_tenant() {
        let service = service().await;
        let published = service
            .publish(&request("app.yaml", "  ", "a=1"))
            .await
            .unwrap();
        assert!(published.success);

        let found = service
            .find(&base_key("app.yaml"), &VariantKind::Base)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), published.id);

        let filter = ConfigSearchFilter {
            tenant: " ".to_string(),
            ..ConfigSearchFilter::default()
        };
        let page = service.search(&filter, 1, 10).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.page_items[0].tenant, "");

        let whitelist = service
            .search_by_keys(
                "\t",
                &[ConfigKeyFilter {
                    data_id: "app.yaml".to_string(),
                    ..ConfigKeyFilter::default()
                }],
                false,
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(whitelist.total_count, 1);
    }

    #[tokio::test]
    async fn test_batch_import_policies() {
        let service = service().await;
        service.publish(&request("b.yaml", "", "old")).await.unwrap();

        let batch = || {
            vec![
                request("a.yaml", "", "a"),
                request("b.yaml", "", "new"),
                request("c.yaml", "", "c"),
            ]
        };

        let skipped = service
            .batch_insert_or_update(batch(), SameConfigPolicy::Skip)
            .await
            .unwrap();
        assert_eq!(skipped.succ_count, 2);
        assert_eq!(skipped.skip_count, 1);
        assert_eq!(skipped.skip_data, vec![base_key("b.yaml")]);

        let aborted = service
            .batch_insert_or_update(batch(), SameConfigPolicy::Abort)
            .await
            .unwrap();
        assert_eq!(aborted.succ_count, 0);
        assert_eq!(aborted.fail_data.len(), 3);

        let overwritten = service
            .batch_insert_or_update(
                vec![request("b.yaml", "", "new"), request("d.yaml", "", "d")],
                SameConfigPolicy::Overwrite,
            )
            .await
            .unwrap();
        assert_eq!(overwritten.succ_count, 2);
        assert_eq!(
            service
                .find(&base_key("b.yaml"), &VariantKind::Base)
                .await
                .unwrap()
                .unwrap()
                .content(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_batch_import_validates_before_writing() {
        let service = service().await;
        let err = service
            .batch_insert_or_update(
                vec![request("a.yaml", "", "a"), request("bad id", "", "b")],
                SameConfigPolicy::Skip,
            )
            .await
            .unwrap_err();
        assert!(is_illegal_argument(&err));
        assert!(
            service
                .find(&base_key("a.yaml"), &VariantKind::Base)
                .await
                .unwrap()
                .is_none()
        );
    }
}
