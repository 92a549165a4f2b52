//! `ConfigPersistence` implementation over `config_info` and `config_tags_relation`

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{prelude::Expr, *};
use tracing::{debug, warn};

use quince_common::{OP_TYPE_DELETE, OP_TYPE_INSERT, OP_TYPE_UPDATE, QuinceError, md5_digest};

use super::history::{formal_history, insert_history};
use super::{
    ExternalDbPersistService, is_unique_violation, is_uniqueness_conflict, md5_matches, now,
    page_offset, to_millis,
};
use crate::entity::{config_info, config_tags_relation};
use crate::model::*;
use crate::query::{
    ConfigKeyFilter, ConfigSearchFilter, key_set_condition, normalize_tags, search_condition,
};
use crate::traits::ConfigPersistence;

fn key_condition(key: &ConfigKey) -> Condition {
    Condition::all()
        .add(config_info::Column::DataId.eq(key.data_id.as_str()))
        .add(config_info::Column::GroupId.eq(key.group.as_str()))
        .add(config_info::Column::TenantId.eq(key.tenant.as_str()))
}

pub(super) fn config_entity_to_storage(model: config_info::Model, tags: String) -> ConfigStorageData {
    ConfigStorageData {
        id: model.id,
        data_id: model.data_id,
        group: model.group_id,
        tenant: model.tenant_id,
        content: model.content,
        md5: model.md5.unwrap_or_default(),
        app_name: model.app_name.unwrap_or_default(),
        config_type: model.r#type.unwrap_or_default(),
        desc: model.c_desc.unwrap_or_default(),
        r#use: model.c_use.unwrap_or_default(),
        effect: model.effect.unwrap_or_default(),
        schema: model.c_schema.unwrap_or_default(),
        config_tags: tags,
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
) -> Result<Option<config_info::Model>, DbErr> {
    config_info::Entity::find()
        .filter(key_condition(key))
        .one(conn)
        .await
}

async fn find_tag_names<C: ConnectionTrait>(conn: &C, id: i64) -> Result<Vec<String>, DbErr> {
    config_tags_relation::Entity::find()
        .select_only()
        .column(config_tags_relation::Column::TagName)
        .filter(config_tags_relation::Column::Id.eq(id))
        .order_by_asc(config_tags_relation::Column::Nid)
        .into_tuple::<String>()
        .all(conn)
        .await
}

pub(super) async fn find_tag_names_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>, DbErr> {
    let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
    if ids.is_empty() {
        return Ok(tags);
    }

    let rows = config_tags_relation::Entity::find()
        .select_only()
        .column(config_tags_relation::Column::Id)
        .column(config_tags_relation::Column::TagName)
        .filter(config_tags_relation::Column::Id.is_in(ids.to_vec()))
        .order_by_asc(config_tags_relation::Column::Nid)
        .into_tuple::<(i64, String)>()
        .all(conn)
        .await?;
    for (id, tag_name) in rows {
        tags.entry(id).or_default().push(tag_name);
    }

    Ok(tags)
}

/// Replace the tag relations of config `id`
pub(super) async fn replace_tags<C: ConnectionTrait>(
    conn: &C,
    id: i64,
    key: &ConfigKey,
    tags: &[&str],
) -> Result<(), DbErr> {
    config_tags_relation::Entity::delete_many()
        .filter(config_tags_relation::Column::Id.eq(id))
        .exec(conn)
        .await?;

    if !tags.is_empty() {
        let tag_entities: Vec<config_tags_relation::ActiveModel> = tags
            .iter()
            .map(|tag| config_tags_relation::ActiveModel {
                id: Set(id),
                tag_name: Set((*tag).to_owned()),
                tag_type: Set(None),
                data_id: Set(key.data_id.clone()),
                group_id: Set(key.group.clone()),
                tenant_id: Set(key.tenant.clone()),
                ..Default::default()
            })
            .collect();
        config_tags_relation::Entity::insert_many(tag_entities)
            .exec(conn)
            .await?;
    }

    Ok(())
}

impl ExternalDbPersistService {
    /// Count, page and attach tags to a config select
    async fn config_page(
        &self,
        select: Select<config_info::Entity>,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>> {
        let total_count = select.clone().count(&self.db).await?;
        if total_count == 0 {
            return Ok(Page::empty());
        }

        let models = select
            .order_by_asc(config_info::Column::Id)
            .offset(page_offset(page_no, page_size))
            .limit(page_size)
            .all(&self.db)
            .await?;

        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let mut tags = find_tag_names_by_ids(&self.db, &ids).await?;
        let items = models
            .into_iter()
            .map(|m| {
                let tag_str = tags.remove(&m.id).unwrap_or_default().join(",");
                config_entity_to_storage(m, tag_str)
            })
            .collect();

        Ok(Page::new(total_count, page_no, page_size, items))
    }
}

#[async_trait]
impl ConfigPersistence for ExternalDbPersistService {
    async fn config_find_one(&self, key: &ConfigKey) -> anyhow::Result<Option<ConfigStorageData>> {
        match find_model(&self.db, key).await? {
            Some(model) => {
                let tags = find_tag_names(&self.db, model.id).await?.join(",");
                Ok(Some(config_entity_to_storage(model, tags)))
            }
            None => Ok(None),
        }
    }

    async fn config_find_by_id(&self, id: i64) -> anyhow::Result<Option<ConfigStorageData>> {
        match config_info::Entity::find_by_id(id).one(&self.db).await? {
            Some(model) => {
                let tags = find_tag_names(&self.db, model.id).await?.join(",");
                Ok(Some(config_entity_to_storage(model, tags)))
            }
            None => Ok(None),
        }
    }

    async fn config_find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<ConfigStorageData>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = config_info::Entity::find()
            .filter(config_info::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(config_info::Column::Id)
            .all(&self.db)
            .await?;
        let mut tags = find_tag_names_by_ids(&self.db, ids).await?;

        Ok(models
            .into_iter()
            .map(|m| {
                let tag_str = tags.remove(&m.id).unwrap_or_default().join(",");
                config_entity_to_storage(m, tag_str)
            })
            .collect())
    }

    async fn config_insert(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let now = now();
        let advance = advance.cloned().unwrap_or_default();
        let entity = config_info::ActiveModel {
            data_id: Set(info.key.data_id.clone()),
            group_id: Set(info.key.group.clone()),
            content: Set(info.content.clone()),
            md5: Set(Some(md5_digest(&info.content))),
            gmt_create: Set(now),
            gmt_modified: Set(now),
            src_user: Set(Some(src_user.to_string())),
            src_ip: Set(Some(src_ip.to_string())),
            app_name: Set(Some(info.app_name.clone().unwrap_or_default())),
            tenant_id: Set(info.key.tenant.clone()),
            c_desc: Set(advance.desc.clone()),
            c_use: Set(advance.r#use.clone()),
            effect: Set(advance.effect.clone()),
            r#type: Set(advance.r#type.clone()),
            c_schema: Set(advance.schema.clone()),
            encrypted_data_key: Set(Some(info.encrypted_data_key.clone())),
            ..Default::default()
        };

        let tx = self.db.begin().await?;

        let model = match entity.insert(&tx).await {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Err(QuinceError::UniquenessConflict(info.key.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };

        let tags = normalize_tags(advance.config_tags.as_deref().unwrap_or_default());
        replace_tags(&tx, model.id, &info.key, &tags).await?;

        let tag_names: Vec<String> = tags.iter().map(|t| (*t).to_owned()).collect();
        insert_history(
            &tx,
            formal_history(&model, &tag_names, OP_TYPE_INSERT, src_ip, src_user),
        )
        .await?;

        tx.commit().await?;

        debug!(key = %info.key, id = model.id, "config inserted");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn config_update(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let tx = self.db.begin().await?;

        let Some(existing) = find_model(&tx, &info.key).await? else {
            tx.rollback().await?;
            warn!(key = %info.key, "config to update does not exist");
            return Ok(ConfigOperateResult::failed());
        };
        let old_tags = find_tag_names(&tx, existing.id).await?;
        let history = formal_history(&existing, &old_tags, OP_TYPE_UPDATE, src_ip, src_user);

        let mut active: config_info::ActiveModel = existing.into();
        active.content = Set(info.content.clone());
        active.md5 = Set(Some(md5_digest(&info.content)));
        active.src_user = Set(Some(src_user.to_string()));
        active.src_ip = Set(Some(src_ip.to_string()));
        active.encrypted_data_key = Set(Some(info.encrypted_data_key.clone()));
        active.gmt_modified = Set(now());
        if let Some(app_name) = &info.app_name {
            active.app_name = Set(Some(app_name.clone()));
        }
        if let Some(advance) = advance {
            active.c_desc = Set(advance.desc.clone());
            active.c_use = Set(advance.r#use.clone());
            active.effect = Set(advance.effect.clone());
            active.r#type = Set(advance.r#type.clone());
            active.c_schema = Set(advance.schema.clone());
        }
        let model = active.update(&tx).await?;

        if let Some(config_tags) = advance.and_then(|a| a.config_tags.as_deref()) {
            replace_tags(&tx, model.id, &info.key, &normalize_tags(config_tags)).await?;
        }
        insert_history(&tx, history).await?;

        tx.commit().await?;

        debug!(key = %info.key, id = model.id, "config updated");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn config_update_cas(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        let expected_md5 = info.md5.as_deref().unwrap_or_default();
        let tx = self.db.begin().await?;

        let Some(existing) = find_model(&tx, &info.key).await? else {
            tx.rollback().await?;
            warn!(key = %info.key, "config to update does not exist");
            return Ok(ConfigOperateResult::failed());
        };
        let old_tags = find_tag_names(&tx, existing.id).await?;

        let mut update = config_info::Entity::update_many()
            .col_expr(config_info::Column::Content, Expr::value(info.content.clone()))
            .col_expr(
                config_info::Column::Md5,
                Expr::value(md5_digest(&info.content)),
            )
            .col_expr(config_info::Column::SrcIp, Expr::value(src_ip))
            .col_expr(config_info::Column::SrcUser, Expr::value(src_user))
            .col_expr(
                config_info::Column::EncryptedDataKey,
                Expr::value(info.encrypted_data_key.clone()),
            )
            .col_expr(config_info::Column::GmtModified, Expr::value(now()));
        if let Some(app_name) = &info.app_name {
            update = update.col_expr(config_info::Column::AppName, Expr::value(app_name.clone()));
        }
        if let Some(advance) = advance {
            update = update
                .col_expr(config_info::Column::CDesc, Expr::value(advance.desc.clone()))
                .col_expr(config_info::Column::CUse, Expr::value(advance.r#use.clone()))
                .col_expr(config_info::Column::Effect, Expr::value(advance.effect.clone()))
                .col_expr(config_info::Column::Type, Expr::value(advance.r#type.clone()))
                .col_expr(config_info::Column::CSchema, Expr::value(advance.schema.clone()));
        }

        let result = update
            .filter(key_condition(&info.key))
            .filter(md5_matches(config_info::Column::Md5, expected_md5))
            .exec(&tx)
            .await?;

        if result.rows_affected == 0 {
            tx.rollback().await?;
            warn!(
                key = %info.key,
                expected_md5,
                "config md5 mismatch, cas update rejected"
            );
            return Ok(ConfigOperateResult::failed());
        }

        if let Some(config_tags) = advance.and_then(|a| a.config_tags.as_deref()) {
            replace_tags(&tx, existing.id, &info.key, &normalize_tags(config_tags)).await?;
        }
        insert_history(
            &tx,
            formal_history(&existing, &old_tags, OP_TYPE_UPDATE, src_ip, src_user),
        )
        .await?;

        let Some(model) = find_model(&tx, &info.key).await? else {
            tx.rollback().await?;
            return Ok(ConfigOperateResult::failed());
        };

        tx.commit().await?;

        debug!(key = %info.key, id = model.id, "config cas updated");
        Ok(ConfigOperateResult::ok(model.id, to_millis(model.gmt_modified)))
    }

    async fn config_upsert(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        if find_model(&self.db, &info.key).await?.is_some() {
            return self.config_update(info, advance, src_ip, src_user).await;
        }

        match self.config_insert(info, advance, src_ip, src_user).await {
            // Lost the race against a concurrent insert of the same key
            Err(e) if is_uniqueness_conflict(&e) => {
                self.config_update(info, advance, src_ip, src_user).await
            }
            result => result,
        }
    }

    async fn config_upsert_cas(
        &self,
        info: &ConfigInfo,
        advance: Option<&ConfigAdvanceInfo>,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<ConfigOperateResult> {
        if find_model(&self.db, &info.key).await?.is_some() {
            return self.config_update_cas(info, advance, src_ip, src_user).await;
        }

        match self.config_insert(info, advance, src_ip, src_user).await {
            Err(e) if is_uniqueness_conflict(&e) => {
                self.config_update_cas(info, advance, src_ip, src_user).await
            }
            result => result,
        }
    }

    async fn config_remove(
        &self,
        key: &ConfigKey,
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<bool> {
        let tx = self.db.begin().await?;

        let Some(existing) = find_model(&tx, key).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        let tags = find_tag_names(&tx, existing.id).await?;

        config_info::Entity::delete_by_id(existing.id)
            .exec(&tx)
            .await?;
        config_tags_relation::Entity::delete_many()
            .filter(config_tags_relation::Column::Id.eq(existing.id))
            .exec(&tx)
            .await?;
        insert_history(
            &tx,
            formal_history(&existing, &tags, OP_TYPE_DELETE, src_ip, src_user),
        )
        .await?;

        tx.commit().await?;

        debug!(key = %key, id = existing.id, "config removed");
        Ok(true)
    }

    async fn config_remove_by_ids(
        &self,
        ids: &[i64],
        src_ip: &str,
        src_user: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.db.begin().await?;

        let models = config_info::Entity::find()
            .filter(config_info::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(config_info::Column::Id)
            .all(&tx)
            .await?;
        if models.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let found_ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let mut tags = find_tag_names_by_ids(&tx, &found_ids).await?;

        let mut removed = Vec::with_capacity(models.len());
        for model in models {
            let model_tags = tags.remove(&model.id).unwrap_or_default();
            insert_history(
                &tx,
                formal_history(&model, &model_tags, OP_TYPE_DELETE, src_ip, src_user),
            )
            .await?;
            removed.push(config_entity_to_storage(model, model_tags.join(",")));
        }

        config_info::Entity::delete_many()
            .filter(config_info::Column::Id.is_in(found_ids.clone()))
            .exec(&tx)
            .await?;
        config_tags_relation::Entity::delete_many()
            .filter(config_tags_relation::Column::Id.is_in(found_ids))
            .exec(&tx)
            .await?;

        tx.commit().await?;

        debug!(count = removed.len(), "configs removed by ids");
        Ok(removed)
    }

    async fn config_search_page(
        &self,
        filter: &ConfigSearchFilter,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>> {
        let mut select = config_info::Entity::find().filter(search_condition(filter));

        // Tag filtering via subquery
        for tag in filter.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            select = select.filter(
                config_info::Column::Id.in_subquery(
                    config_tags_relation::Entity::find()
                        .select_only()
                        .column(config_tags_relation::Column::Id)
                        .filter(config_tags_relation::Column::TagName.eq(tag))
                        .into_query(),
                ),
            );
        }

        self.config_page(select, page_no, page_size).await
    }

    async fn config_search_by_keys(
        &self,
        tenant: &str,
        keys: &[ConfigKeyFilter],
        blacklist: bool,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigStorageData>> {
        let Some(condition) = key_set_condition(keys, blacklist) else {
            return Ok(Page::empty());
        };

        let select = config_info::Entity::find()
            .filter(config_info::Column::TenantId.eq(tenant))
            .filter(condition);

        self.config_page(select, page_no, page_size).await
    }

    async fn config_find_tags(&self, key: &ConfigKey) -> anyhow::Result<Vec<String>> {
        Ok(config_tags_relation::Entity::find()
            .select_only()
            .column(config_tags_relation::Column::TagName)
            .filter(config_tags_relation::Column::DataId.eq(key.data_id.as_str()))
            .filter(config_tags_relation::Column::GroupId.eq(key.group.as_str()))
            .filter(config_tags_relation::Column::TenantId.eq(key.tenant.as_str()))
            .order_by_asc(config_tags_relation::Column::Nid)
            .into_tuple::<String>()
            .all(&self.db)
            .await?)
    }

    async fn config_count(&self) -> anyhow::Result<u64> {
        Ok(config_info::Entity::find().count(&self.db).await?)
    }

    async fn config_count_by_tenant(&self, tenant: &str) -> anyhow::Result<u64> {
        Ok(config_info::Entity::find()
            .filter(config_info::Column::TenantId.eq(tenant))
            .count(&self.db)
            .await?)
    }

    async fn config_max_id(&self) -> anyhow::Result<i64> {
        let max_id = config_info::Entity::find()
            .select_only()
            .column_as(Expr::col(config_info::Column::Id).max(), "max_id")
            .into_tuple::<Option<i64>>()
            .one(&self.db)
            .await?
            .flatten()
            .unwrap_or_default();
        Ok(max_id)
    }

    async fn config_find_all_group_names(&self, tenant: &str) -> anyhow::Result<Vec<String>> {
        Ok(config_info::Entity::find()
            .select_only()
            .column(config_info::Column::GroupId)
            .filter(config_info::Column::TenantId.eq(tenant))
            .distinct()
            .order_by_asc(config_info::Column::GroupId)
            .into_tuple::<String>()
            .all(&self.db)
            .await?)
    }
}
