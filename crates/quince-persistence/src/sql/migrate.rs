//! `MigratePersistence` implementation: paged cross-tenant reads and bulk copies

use async_trait::async_trait;
use sea_orm::{
    prelude::Expr,
    sea_query::{Func, SelectStatement, SimpleExpr},
    *,
};
use tracing::debug;

use quince_common::{OP_TYPE_INSERT, QuinceError};

use super::config::{config_entity_to_storage, find_tag_names_by_ids, replace_tags};
use super::gray::gray_entity_to_storage;
use super::history::{formal_history, gray_history, insert_history};
use super::{ExternalDbPersistService, is_unique_violation, now};
use crate::entity::{config_info, config_info_gray};
use crate::model::*;
use crate::traits::MigratePersistence;

fn md5_or_empty<C: ColumnTrait>(column: C) -> SimpleExpr {
    Func::coalesce([Expr::col(column).into(), Expr::val("").into()]).into()
}

fn not_written_by<C: ColumnTrait>(column: C, migrate_user: &str) -> Condition {
    Condition::any()
        .add(column.is_null())
        .add(column.ne(migrate_user))
}

fn config_key_tuple() -> Expr {
    Expr::tuple([
        Expr::col(config_info::Column::DataId).into(),
        Expr::col(config_info::Column::GroupId).into(),
    ])
}

fn config_keys(filter: Condition) -> SelectStatement {
    config_info::Entity::find()
        .select_only()
        .column(config_info::Column::DataId)
        .column(config_info::Column::GroupId)
        .filter(filter)
        .into_query()
}

fn gray_key_tuple() -> Expr {
    Expr::tuple([
        Expr::col(config_info_gray::Column::DataId).into(),
        Expr::col(config_info_gray::Column::GroupId).into(),
        Expr::col(config_info_gray::Column::GrayName).into(),
    ])
}

fn gray_keys(filter: Condition) -> SelectStatement {
    config_info_gray::Entity::find()
        .select_only()
        .column(config_info_gray::Column::DataId)
        .column(config_info_gray::Column::GroupId)
        .column(config_info_gray::Column::GrayName)
        .filter(filter)
        .into_query()
}

#[async_trait]
impl MigratePersistence for ExternalDbPersistService {
    async fn config_conflict_count(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        migrate_user: &str,
    ) -> anyhow::Result<u64> {
        let target = config_keys(
            Condition::all()
                .add(config_info::Column::TenantId.eq(target_tenant))
                .add(not_written_by(config_info::Column::SrcUser, migrate_user)),
        );
        Ok(config_info::Entity::find()
            .filter(config_info::Column::TenantId.eq(source_tenant))
            .filter(not_written_by(config_info::Column::SrcUser, migrate_user))
            .filter(config_key_tuple().in_subquery(target))
            .count(&self.db)
            .await?)
    }

    async fn gray_conflict_count(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        migrate_user: &str,
    ) -> anyhow::Result<u64> {
        let target = gray_keys(
            Condition::all()
                .add(config_info_gray::Column::TenantId.eq(target_tenant))
                .add(not_written_by(config_info_gray::Column::SrcUser, migrate_user)),
        );
        Ok(config_info_gray::Entity::find()
            .filter(config_info_gray::Column::TenantId.eq(source_tenant))
            .filter(not_written_by(config_info_gray::Column::SrcUser, migrate_user))
            .filter(gray_key_tuple().in_subquery(target))
            .count(&self.db)
            .await?)
    }

    async fn config_migrate_insert_ids(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
    ) -> anyhow::Result<Vec<i64>> {
        let target =
            config_keys(Condition::all().add(config_info::Column::TenantId.eq(target_tenant)));
        Ok(config_info::Entity::find()
            .select_only()
            .column(config_info::Column::Id)
            .filter(config_info::Column::TenantId.eq(source_tenant))
            .filter(config_info::Column::Id.gt(start_id))
            .filter(config_key_tuple().not_in_subquery(target))
            .order_by_asc(config_info::Column::Id)
            .limit(page_size)
            .into_tuple::<i64>()
            .all(&self.db)
            .await?)
    }

    async fn gray_migrate_insert_ids(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
    ) -> anyhow::Result<Vec<i64>> {
        let target =
            gray_keys(Condition::all().add(config_info_gray::Column::TenantId.eq(target_tenant)));
        Ok(config_info_gray::Entity::find()
            .select_only()
            .column(config_info_gray::Column::Id)
            .filter(config_info_gray::Column::TenantId.eq(source_tenant))
            .filter(config_info_gray::Column::Id.gt(start_id))
            .filter(gray_key_tuple().not_in_subquery(target))
            .order_by_asc(config_info_gray::Column::Id)
            .limit(page_size)
            .into_tuple::<i64>()
            .all(&self.db)
            .await?)
    }

    async fn config_migrate_insert_by_ids(
        &self,
        ids: &[i64],
        target_tenant: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sources = config_info::Entity::find()
            .filter(config_info::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(config_info::Column::Id)
            .all(&self.db)
            .await?;
        let mut tags = find_tag_names_by_ids(&self.db, ids).await?;

        let now = now();
        let tx = self.db.begin().await?;
        let mut copied = 0;

        for source in sources {
            let key = ConfigKey::new(&source.data_id, &source.group_id, target_tenant);
            let entity = config_info::ActiveModel {
                data_id: Set(source.data_id.clone()),
                group_id: Set(source.group_id.clone()),
                content: Set(source.content.clone()),
                md5: Set(source.md5.clone()),
                gmt_create: Set(now),
                gmt_modified: Set(now),
                src_user: Set(Some(src_user.to_string())),
                src_ip: Set(Some(src_ip.to_string())),
                app_name: Set(source.app_name.clone()),
                tenant_id: Set(key.tenant.clone()),
                c_desc: Set(source.c_desc.clone()),
                c_use: Set(source.c_use.clone()),
                effect: Set(source.effect.clone()),
                r#type: Set(source.r#type.clone()),
                c_schema: Set(source.c_schema.clone()),
                encrypted_data_key: Set(source.encrypted_data_key.clone()),
                ..Default::default()
            };

            let model = match entity.insert(&tx).await {
                Ok(model) => model,
                Err(e) if is_unique_violation(&e) => {
                    tx.rollback().await?;
                    return Err(QuinceError::UniquenessConflict(key.to_string()).into());
                }
                Err(e) => return Err(e.into()),
            };

            let tag_names = tags.remove(&source.id).unwrap_or_default();
            let tag_refs: Vec<&str> = tag_names.iter().map(String::as_str).collect();
            replace_tags(&tx, model.id, &key, &tag_refs).await?;
            insert_history(
                &tx,
                formal_history(&model, &tag_names, OP_TYPE_INSERT, src_ip, src_user),
            )
            .await?;
            copied += 1;
        }

        tx.commit().await?;

        debug!(target_tenant, copied, "configs copied across tenants");
        Ok(copied)
    }

    async fn gray_migrate_insert_by_ids(
        &self,
        ids: &[i64],
        target_tenant: &str,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sources = config_info_gray::Entity::find()
            .filter(config_info_gray::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(config_info_gray::Column::Id)
            .all(&self.db)
            .await?;

        let now = now();
        let tx = self.db.begin().await?;
        let mut copied = 0;

        for source in sources {
            let key = ConfigKey::new(&source.data_id, &source.group_id, target_tenant);
            let entity = config_info_gray::ActiveModel {
                data_id: Set(source.data_id.clone()),
                group_id: Set(source.group_id.clone()),
                content: Set(source.content.clone()),
                md5: Set(source.md5.clone()),
                src_user: Set(Some(src_user.to_string())),
                src_ip: Set(Some(src_ip.to_string())),
                gmt_create: Set(now),
                gmt_modified: Set(now),
                app_name: Set(source.app_name.clone()),
                tenant_id: Set(key.tenant.clone()),
                gray_name: Set(source.gray_name.clone()),
                gray_rule: Set(source.gray_rule.clone()),
                encrypted_data_key: Set(source.encrypted_data_key.clone()),
                ..Default::default()
            };

            let model = match entity.insert(&tx).await {
                Ok(model) => model,
                Err(e) if is_unique_violation(&e) => {
                    tx.rollback().await?;
                    return Err(QuinceError::UniquenessConflict(format!(
                        "{}, grayName={}",
                        key, source.gray_name
                    ))
                    .into());
                }
                Err(e) => return Err(e.into()),
            };

            insert_history(&tx, gray_history(&model, OP_TYPE_INSERT, src_ip, src_user)).await?;
            copied += 1;
        }

        tx.commit().await?;

        debug!(target_tenant, copied, "gray configs copied across tenants");
        Ok(copied)
    }

    async fn config_migrate_update_list(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
        migrate_user: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>> {
        let twins =
            config_keys(Condition::all().add(config_info::Column::TenantId.eq(target_tenant)));
        let same_content = config_info::Entity::find()
            .select_only()
            .column(config_info::Column::DataId)
            .column(config_info::Column::GroupId)
            .expr(md5_or_empty(config_info::Column::Md5))
            .filter(config_info::Column::TenantId.eq(target_tenant))
            .into_query();
        let fingerprint = Expr::tuple([
            Expr::col(config_info::Column::DataId).into(),
            Expr::col(config_info::Column::GroupId).into(),
            md5_or_empty(config_info::Column::Md5),
        ]);

        let models = config_info::Entity::find()
            .filter(config_info::Column::TenantId.eq(source_tenant))
            .filter(config_info::Column::Id.gt(start_id))
            .filter(not_written_by(config_info::Column::SrcUser, migrate_user))
            .filter(config_key_tuple().in_subquery(twins))
            .filter(fingerprint.not_in_subquery(same_content))
            .order_by_asc(config_info::Column::Id)
            .limit(page_size)
            .all(&self.db)
            .await?;

        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let mut tags = find_tag_names_by_ids(&self.db, &ids).await?;
        Ok(models
            .into_iter()
            .map(|m| {
                let tag_str = tags.remove(&m.id).unwrap_or_default().join(",");
                config_entity_to_storage(m, tag_str)
            })
            .collect())
    }

    async fn gray_migrate_update_list(
        &self,
        source_tenant: &str,
        target_tenant: &str,
        start_id: i64,
        page_size: u64,
        migrate_user: &str,
    ) -> anyhow::Result<Vec<ConfigGrayStorageData>> {
        let twins =
            gray_keys(Condition::all().add(config_info_gray::Column::TenantId.eq(target_tenant)));
        let same_content = config_info_gray::Entity::find()
            .select_only()
            .column(config_info_gray::Column::DataId)
            .column(config_info_gray::Column::GroupId)
            .column(config_info_gray::Column::GrayName)
            .expr(md5_or_empty(config_info_gray::Column::Md5))
            .column(config_info_gray::Column::GrayRule)
            .filter(config_info_gray::Column::TenantId.eq(target_tenant))
            .into_query();
        let fingerprint = Expr::tuple([
            Expr::col(config_info_gray::Column::DataId).into(),
            Expr::col(config_info_gray::Column::GroupId).into(),
            Expr::col(config_info_gray::Column::GrayName).into(),
            md5_or_empty(config_info_gray::Column::Md5),
            Expr::col(config_info_gray::Column::GrayRule).into(),
        ]);

        Ok(config_info_gray::Entity::find()
            .filter(config_info_gray::Column::TenantId.eq(source_tenant))
            .filter(config_info_gray::Column::Id.gt(start_id))
            .filter(not_written_by(config_info_gray::Column::SrcUser, migrate_user))
            .filter(gray_key_tuple().in_subquery(twins))
            .filter(fingerprint.not_in_subquery(same_content))
            .order_by_asc(config_info_gray::Column::Id)
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(gray_entity_to_storage)
            .collect())
    }
}
