//! `TagPersistence` implementation over `config_info_tag`

use async_trait::async_trait;
use sea_orm::*;
use tracing::{debug, warn};

use quince_common::{QuinceError, md5_digest};

use super::{
    ExternalDbPersistService, is_unique_violation, is_uniqueness_conflict, now, page_offset,
    to_millis,
};
use crate::entity::config_info_tag;
use crate::model::*;
use crate::traits::TagPersistence;

fn tag_condition(key: &ConfigKey, tag: &str) -> Condition {
    Condition::all()
        .add(config_info_tag::Column::DataId.eq(key.data_id.as_str()))
        .add(config_info_tag::Column::GroupId.eq(key.group.as_str()))
        .add(config_info_tag::Column::TenantId.eq(key.tenant.as_str()))
        .add(config_info_tag::Column::TagId.eq(tag))
}

fn tag_entity_to_storage(model: config_info_tag::Model) -> ConfigTagStorageData {
    ConfigTagStorageData {
        id: model.id,
        data_id: model.data_id,
        group: model.group_id,
        tenant: model.tenant_id,
        tag: model.tag_id,
        content: model.content,
        md5: model.md5.unwrap_or_default(),
        app_name: model.app_name.unwrap_or_default(),
        encrypted_data_key: model.encrypted_data_key.unwrap_or_default(),
        src_user: model.src_user.unwrap_or_default(),
        src_ip: model.src_ip.unwrap_or_default(),
        created_time: to_millis(model.gmt_create),
        modified_time: to_millis(model.gmt_modified),
    }
}

#[async_trait]
impl TagPersistence for ExternalDbPersistService {
    async fn tag_find_one(
        &self,
        key: &ConfigKey,
        tag: &str,
    ) -> anyhow::Result<Option<ConfigTagStorageData>> {
        Ok(config_info_tag::Entity::find()
            .filter(tag_condition(key, tag))
            .one(&self.db)
            .await?
            .map(tag_entity_to_storage))
    }

    async fn tag_insert(
        &self,
        info: &ConfigInfo,
        tag: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let now = now();
        let entity = config_info_tag::ActiveModel {
            data_id: Set(info.key.data_id.clone()),
            group_id: Set(info.key.group.clone()),
            tenant_id: Set(info.key.tenant.clone()),
            tag_id: Set(tag.to_string()),
            app_name: Set(Some(info.app_name.clone().unwrap_or_default())),
            content: Set(info.content.clone()),
            md5: Set(Some(md5_digest(&info.content))),
            gmt_create: Set(now),
            gmt_modified: Set(now),
            src_user: Set(Some(src_user.to_string())),
            src_ip: Set(Some(src_ip.to_string())),
            encrypted_data_key: Set(Some(info.encrypted_data_key.clone())),
            ..Default::default()
        };

        match entity.insert(&self.db).await {
            Ok(model) => {
                debug!(key = %info.key, tag, "tag config inserted");
                Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
            }
            Err(e) if is_unique_violation(&e) => Err(QuinceError::UniquenessConflict(format!(
                "{}, tag={}",
                info.key, tag
            ))
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn tag_update(
        &self,
        info: &ConfigInfo,
        tag: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let Some(existing) = config_info_tag::Entity::find()
            .filter(tag_condition(&info.key, tag))
            .one(&self.db)
            .await?
        else {
            warn!(key = %info.key, tag, "tag config to update does not exist");
            return Ok(ConfigOperateResult::failed());
        };

        let mut active: config_info_tag::ActiveModel = existing.into();
        active.content = Set(info.content.clone());
        active.md5 = Set(Some(md5_digest(&info.content)));
        active.src_user = Set(Some(src_user.to_string()));
        active.src_ip = Set(Some(src_ip.to_string()));
        active.encrypted_data_key = Set(Some(info.encrypted_data_key.clone()));
        active.gmt_modified = Set(now());
        if let Some(app_name) = &info.app_name {
            active.app_name = Set(Some(app_name.clone()));
        }
        let model = active.update(&self.db).await?;

        debug!(key = %info.key, tag, "tag config updated");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn tag_upsert(
        &self,
        info: &ConfigInfo,
        tag: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        if self.tag_find_one(&info.key, tag).await?.is_some() {
            return self.tag_update(info, tag, src_ip, src_user).await;
        }

        match self.tag_insert(info, tag, src_ip, src_user).await {
            Err(e) if is_uniqueness_conflict(&e) => {
                self.tag_update(info, tag, src_ip, src_user).await
            }
            result => result,
        }
    }

    async fn tag_remove(&self, key: &ConfigKey, tag: &str) -> anyhow::Result<bool> {
        let result = config_info_tag::Entity::delete_many()
            .filter(tag_condition(key, tag))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn tag_count(&self) -> anyhow::Result<u64> {
        Ok(config_info_tag::Entity::find().count(&self.db).await?)
    }

    async fn tag_find_all(
        &self,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigTagStorageData>> {
        let total_count = config_info_tag::Entity::find().count(&self.db).await?;
        if total_count == 0 {
            return Ok(Page::empty());
        }

        let items = config_info_tag::Entity::find()
            .order_by_asc(config_info_tag::Column::Id)
            .offset(page_offset(page_no, page_size))
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(tag_entity_to_storage)
            .collect();

        Ok(Page::new(total_count, page_no, page_size, items))
    }
}
