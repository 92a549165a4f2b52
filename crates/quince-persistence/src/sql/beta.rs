//! `BetaPersistence` implementation over `config_info_beta`

use async_trait::async_trait;
use sea_orm::*;
use tracing::{debug, warn};

use quince_common::{QuinceError, md5_digest};

use super::{
    ExternalDbPersistService, is_unique_violation, is_uniqueness_conflict, now, page_offset,
    to_millis,
};
use crate::entity::config_info_beta;
use crate::model::*;
use crate::traits::BetaPersistence;

fn beta_condition(key: &ConfigKey) -> Condition {
    Condition::all()
        .add(config_info_beta::Column::DataId.eq(key.data_id.as_str()))
        .add(config_info_beta::Column::GroupId.eq(key.group.as_str()))
        .add(config_info_beta::Column::TenantId.eq(key.tenant.as_str()))
}

fn beta_entity_to_storage(model: config_info_beta::Model) -> ConfigBetaStorageData {
    ConfigBetaStorageData {
        id: model.id,
        data_id: model.data_id,
        group: model.group_id,
        tenant: model.tenant_id,
        content: model.content,
        md5: model.md5.unwrap_or_default(),
        app_name: model.app_name.unwrap_or_default(),
        beta_ips: model.beta_ips.unwrap_or_default(),
        encrypted_data_key: model.encrypted_data_key.unwrap_or_default(),
        src_user: model.src_user.unwrap_or_default(),
        src_ip: model.src_ip.unwrap_or_default(),
        created_time: to_millis(model.gmt_create),
        modified_time: to_millis(model.gmt_modified),
    }
}

#[async_trait]
impl BetaPersistence for ExternalDbPersistService {
    async fn beta_find_one(
        &self,
        key: &ConfigKey,
    ) -> anyhow::Result<Option<ConfigBetaStorageData>> {
        Ok(config_info_beta::Entity::find()
            .filter(beta_condition(key))
            .one(&self.db)
            .await?
            .map(beta_entity_to_storage))
    }

    async fn beta_insert(
        &self,
        info: &ConfigInfo,
        beta_ips: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let now = now();
        let entity = config_info_beta::ActiveModel {
            data_id: Set(info.key.data_id.clone()),
            group_id: Set(info.key.group.clone()),
            app_name: Set(Some(info.app_name.clone().unwrap_or_default())),
            content: Set(info.content.clone()),
            beta_ips: Set(Some(beta_ips.to_string())),
            md5: Set(Some(md5_digest(&info.content))),
            gmt_create: Set(now),
            gmt_modified: Set(now),
            src_user: Set(Some(src_user.to_string())),
            src_ip: Set(Some(src_ip.to_string())),
            tenant_id: Set(info.key.tenant.clone()),
            encrypted_data_key: Set(Some(info.encrypted_data_key.clone())),
            ..Default::default()
        };

        match entity.insert(&self.db).await {
            Ok(model) => {
                debug!(key = %info.key, "beta config inserted");
                Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
            }
            Err(e) if is_unique_violation(&e) => {
                Err(QuinceError::UniquenessConflict(info.key.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn beta_update(
        &self,
        info: &ConfigInfo,
        beta_ips: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let Some(existing) = config_info_beta::Entity::find()
            .filter(beta_condition(&info.key))
            .one(&self.db)
            .await?
        else {
            warn!(key = %info.key, "beta config to update does not exist");
            return Ok(ConfigOperateResult::failed());
        };

        let mut active: config_info_beta::ActiveModel = existing.into();
        active.content = Set(info.content.clone());
        active.md5 = Set(Some(md5_digest(&info.content)));
        active.beta_ips = Set(Some(beta_ips.to_string()));
        active.src_user = Set(Some(src_user.to_string()));
        active.src_ip = Set(Some(src_ip.to_string()));
        active.encrypted_data_key = Set(Some(info.encrypted_data_key.clone()));
        active.gmt_modified = Set(now());
        if let Some(app_name) = &info.app_name {
            active.app_name = Set(Some(app_name.clone()));
        }
        let model = active.update(&self.db).await?;

        debug!(key = %info.key, "beta config updated");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn beta_upsert(
        &self,
        info: &ConfigInfo,
        beta_ips: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        if self.beta_find_one(&info.key).await?.is_some() {
            return self.beta_update(info, beta_ips, src_ip, src_user).await;
        }

        match self.beta_insert(info, beta_ips, src_ip, src_user).await {
            Err(e) if is_uniqueness_conflict(&e) => {
                self.beta_update(info, beta_ips, src_ip, src_user).await
            }
            result => result,
        }
    }

    async fn beta_remove(&self, key: &ConfigKey) -> anyhow::Result<bool> {
        let result = config_info_beta::Entity::delete_many()
            .filter(beta_condition(key))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn beta_count(&self) -> anyhow::Result<u64> {
        Ok(config_info_beta::Entity::find().count(&self.db).await?)
    }

    async fn beta_find_all(
        &self,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigBetaStorageData>> {
        let total_count = config_info_beta::Entity::find().count(&self.db).await?;
        if total_count == 0 {
            return Ok(Page::empty());
        }

        let items = config_info_beta::Entity::find()
            .order_by_asc(config_info_beta::Column::Id)
            .offset(page_offset(page_no, page_size))
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(beta_entity_to_storage)
            .collect();

        Ok(Page::new(total_count, page_no, page_size, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sql::test_support::{info, key, setup};
    use crate::traits::HistoryPersistence;

    #[tokio::test]
    async fn test_beta_lifecycle_without_history() {
        let service = setup().await;

        let inserted = service
            .beta_insert(&info("app.yaml", "b1"), "10.0.0.1,10.0.0.2", "", "")
            .await
            .unwrap();
        assert!(inserted.success);

        let err = service
            .beta_insert(&info("app.yaml", "b2"), "10.0.0.1", "", "")
            .await
            .unwrap_err();
        assert!(is_uniqueness_conflict(&err));

        let updated = service
            .beta_upsert(&info("app.yaml", "b2"), "10.0.0.3", "", "")
            .await
            .unwrap();
        assert_eq!(updated.id, inserted.id);

        let found = service.beta_find_one(&key("app.yaml")).await.unwrap().unwrap();
        assert_eq!(found.content, "b2");
        assert_eq!(found.beta_ips, "10.0.0.3");
        assert_eq!(service.beta_count().await.unwrap(), 1);
        assert_eq!(service.beta_find_all(1, 10).await.unwrap().total_count, 1);

        assert!(service.beta_remove(&key("app.yaml")).await.unwrap());
        assert!(!service.beta_remove(&key("app.yaml")).await.unwrap());

        let history = service
            .history_search_page(&key("app.yaml"), 1, 10)
            .await
            .unwrap();
        assert_eq!(history.total_count, 0);
    }

    #[tokio::test]
    async fn test_beta_update_missing_row_fails() {
        let service = setup().await;
        let result = service
            .beta_update(&info("app.yaml", "b1"), "10.0.0.1", "", "")
            .await
            .unwrap();
        assert!(!result.success);
    }
}
