//! `GrayPersistence` implementation over `config_info_gray`

use async_trait::async_trait;
use sea_orm::{prelude::Expr, *};
use tracing::{debug, error, warn};

use quince_common::{OP_TYPE_DELETE, OP_TYPE_INSERT, OP_TYPE_UPDATE, QuinceError, md5_digest};

use super::history::{gray_history, insert_history};
use super::{
    ExternalDbPersistService, is_unique_violation, is_uniqueness_conflict, md5_matches, now,
    page_offset, to_millis,
};
use crate::entity::config_info_gray;
use crate::model::*;
use crate::traits::GrayPersistence;

fn gray_condition(key: &ConfigKey, gray_name: &str) -> Condition {
    Condition::all()
        .add(config_info_gray::Column::DataId.eq(key.data_id.as_str()))
        .add(config_info_gray::Column::GroupId.eq(key.group.as_str()))
        .add(config_info_gray::Column::TenantId.eq(key.tenant.as_str()))
        .add(config_info_gray::Column::GrayName.eq(gray_name))
}

pub(super) fn gray_entity_to_storage(model: config_info_gray::Model) -> ConfigGrayStorageData {
    ConfigGrayStorageData {
        id: model.id,
        data_id: model.data_id,
        group: model.group_id,
        tenant: model.tenant_id,
        content: model.content,
        md5: model.md5.unwrap_or_default(),
        app_name: model.app_name.unwrap_or_default(),
        gray_name: model.gray_name,
        gray_rule: model.gray_rule,
        encrypted_data_key: model.encrypted_data_key.unwrap_or_default(),
        src_user: model.src_user.unwrap_or_default(),
        src_ip: model.src_ip.unwrap_or_default(),
        created_time: to_millis(model.gmt_create),
        modified_time: to_millis(model.gmt_modified),
    }
}

async fn find_model<C: ConnectionTrait>(
    conn: &C,
    key: &ConfigKey,
    gray_name: &str,
) -> Result<Option<config_info_gray::Model>, DbErr> {
    config_info_gray::Entity::find()
        .filter(gray_condition(key, gray_name))
        .one(conn)
        .await
}

impl ExternalDbPersistService {
    /// Shared CAS write; `replace_rule` swaps the rule guard for a rule update
    #[allow(clippy::too_many_arguments)]
    async fn gray_cas(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        replace_rule: bool,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let expected_md5 = info.md5.as_deref().unwrap_or_default();
        let tx = self.db.begin().await?;

        let Some(existing) = find_model(&tx, &info.key, gray_name).await? else {
            tx.rollback().await?;
            warn!(key = %info.key, gray_name, "gray config to update does not exist");
            return Ok(ConfigOperateResult::failed());
        };

        let mut update = config_info_gray::Entity::update_many()
            .col_expr(
                config_info_gray::Column::Content,
                Expr::value(info.content.clone()),
            )
            .col_expr(
                config_info_gray::Column::Md5,
                Expr::value(md5_digest(&info.content)),
            )
            .col_expr(config_info_gray::Column::SrcIp, Expr::value(src_ip))
            .col_expr(config_info_gray::Column::SrcUser, Expr::value(src_user))
            .col_expr(
                config_info_gray::Column::EncryptedDataKey,
                Expr::value(info.encrypted_data_key.clone()),
            )
            .col_expr(config_info_gray::Column::GmtModified, Expr::value(now()));
        if let Some(app_name) = &info.app_name {
            update = update.col_expr(
                config_info_gray::Column::AppName,
                Expr::value(app_name.clone()),
            );
        }
        update = if replace_rule {
            update.col_expr(config_info_gray::Column::GrayRule, Expr::value(gray_rule))
        } else {
            update.filter(config_info_gray::Column::GrayRule.eq(gray_rule))
        };

        let result = update
            .filter(gray_condition(&info.key, gray_name))
            .filter(md5_matches(config_info_gray::Column::Md5, expected_md5))
            .exec(&tx)
            .await?;

        if result.rows_affected == 0 {
            tx.rollback().await?;
            warn!(
                key = %info.key,
                gray_name,
                expected_md5,
                "gray config md5 or rule mismatch, cas update rejected"
            );
            return Ok(ConfigOperateResult::failed());
        }

        let Some(model) = find_model(&tx, &info.key, gray_name).await? else {
            tx.rollback().await?;
            error!(key = %info.key, gray_name, "gray config vanished after cas update");
            return Ok(ConfigOperateResult::failed());
        };

        insert_history(
            &tx,
            gray_history(&existing, OP_TYPE_UPDATE, src_ip, src_user),
        )
        .await?;

        tx.commit().await?;

        debug!(key = %info.key, gray_name, id = model.id, "gray config cas updated");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }
}

#[async_trait]
impl GrayPersistence for ExternalDbPersistService {
    async fn gray_find_one(
        &self,
        key: &ConfigKey,
        gray_name: &str,
    ) -> anyhow::Result<Option<ConfigGrayStorageData>> {
        Ok(find_model(&self.db, key, gray_name)
            .await?
            .map(gray_entity_to_storage))
    }

    async fn gray_insert(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let now = now();
        let entity = config_info_gray::ActiveModel {
            data_id: Set(info.key.data_id.clone()),
            group_id: Set(info.key.group.clone()),
            content: Set(info.content.clone()),
            md5: Set(Some(md5_digest(&info.content))),
            src_user: Set(Some(src_user.to_string())),
            src_ip: Set(Some(src_ip.to_string())),
            gmt_create: Set(now),
            gmt_modified: Set(now),
            app_name: Set(Some(info.app_name.clone().unwrap_or_default())),
            tenant_id: Set(info.key.tenant.clone()),
            gray_name: Set(gray_name.to_string()),
            gray_rule: Set(gray_rule.to_string()),
            encrypted_data_key: Set(Some(info.encrypted_data_key.clone())),
            ..Default::default()
        };

        let tx = self.db.begin().await?;

        let model = match entity.insert(&tx).await {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Err(QuinceError::UniquenessConflict(format!(
                    "{}, grayName={}",
                    info.key, gray_name
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        insert_history(&tx, gray_history(&model, OP_TYPE_INSERT, src_ip, src_user)).await?;

        tx.commit().await?;

        debug!(key = %info.key, gray_name, id = model.id, "gray config inserted");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn gray_update(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let tx = self.db.begin().await?;

        let Some(existing) = find_model(&tx, &info.key, gray_name).await? else {
            tx.rollback().await?;
            warn!(key = %info.key, gray_name, "gray config to update does not exist");
            return Ok(ConfigOperateResult::failed());
        };
        let history = gray_history(&existing, OP_TYPE_UPDATE, src_ip, src_user);

        let mut active: config_info_gray::ActiveModel = existing.into();
        active.content = Set(info.content.clone());
        active.md5 = Set(Some(md5_digest(&info.content)));
        active.gray_rule = Set(gray_rule.to_string());
        active.src_user = Set(Some(src_user.to_string()));
        active.src_ip = Set(Some(src_ip.to_string()));
        active.encrypted_data_key = Set(Some(info.encrypted_data_key.clone()));
        active.gmt_modified = Set(now());
        if let Some(app_name) = &info.app_name {
            active.app_name = Set(Some(app_name.clone()));
        }
        let model = active.update(&tx).await?;

        insert_history(&tx, history).await?;

        tx.commit().await?;

        debug!(key = %info.key, gray_name, id = model.id, "gray config updated");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn gray_update_cas(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        self.gray_cas(info, gray_name, gray_rule, false, src_ip, src_user)
            .await
    }

    async fn gray_update_cas_rule(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        self.gray_cas(info, gray_name, gray_rule, true, src_ip, src_user)
            .await
    }

    async fn gray_upsert(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        if find_model(&self.db, &info.key, gray_name).await?.is_some() {
            return self
                .gray_update(info, gray_name, gray_rule, src_ip, src_user)
                .await;
        }

        match self
            .gray_insert(info, gray_name, gray_rule, src_ip, src_user)
            .await
        {
            Err(e) if is_uniqueness_conflict(&e) => {
                self.gray_update(info, gray_name, gray_rule, src_ip, src_user)
                    .await
            }
            result => result,
        }
    }

    async fn gray_upsert_cas(
        &self,
        info: &ConfigInfo,
        gray_name: &str,
        gray_rule: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        if find_model(&self.db, &info.key, gray_name).await?.is_some() {
            return self
                .gray_update_cas(info, gray_name, gray_rule, src_ip, src_user)
                .await;
        }

        match self
            .gray_insert(info, gray_name, gray_rule, src_ip, src_user)
            .await
        {
            Err(e) if is_uniqueness_conflict(&e) => {
                self.gray_update_cas(info, gray_name, gray_rule, src_ip, src_user)
                    .await
            }
            result => result,
        }
    }

    async fn gray_remove(
        &self,
        key: &ConfigKey,
        gray_name: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool> {
        let tx = self.db.begin().await?;

        let Some(existing) = find_model(&tx, key, gray_name).await? else {
            tx.rollback().await?;
            return Ok(false);
        };

        config_info_gray::Entity::delete_by_id(existing.id)
            .exec(&tx)
            .await?;
        insert_history(
            &tx,
            gray_history(&existing, OP_TYPE_DELETE, src_ip, src_user),
        )
        .await?;

        tx.commit().await?;

        debug!(key = %key, gray_name, "gray config removed");
        Ok(true)
    }

    async fn gray_find_names(&self, key: &ConfigKey) -> anyhow::Result<Vec<String>> {
        Ok(config_info_gray::Entity::find()
            .select_only()
            .column(config_info_gray::Column::GrayName)
            .filter(config_info_gray::Column::DataId.eq(key.data_id.as_str()))
            .filter(config_info_gray::Column::GroupId.eq(key.group.as_str()))
            .filter(config_info_gray::Column::TenantId.eq(key.tenant.as_str()))
            .order_by_asc(config_info_gray::Column::GrayName)
            .into_tuple::<String>()
            .all(&self.db)
            .await?)
    }

    async fn gray_count(&self) -> anyhow::Result<u64> {
        Ok(config_info_gray::Entity::find().count(&self.db).await?)
    }

    async fn gray_find_all(
        &self,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigGrayStorageData>> {
        let total_count = config_info_gray::Entity::find().count(&self.db).await?;
        if total_count == 0 {
            return Ok(Page::empty());
        }

        let items = config_info_gray::Entity::find()
            .order_by_asc(config_info_gray::Column::Id)
            .offset(page_offset(page_no, page_size))
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(gray_entity_to_storage)
            .collect();

        Ok(Page::new(total_count, page_no, page_size, items))
    }
}
