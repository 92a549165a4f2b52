//! History recording and the `HistoryPersistence` implementation

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::*;

use quince_common::{PUBLISH_TYPE_FORMAL, PUBLISH_TYPE_GRAY};

use super::{ExternalDbPersistService, now, page_offset, to_millis};
use crate::entity::{config_info, config_info_gray, his_config_info};
use crate::model::{ConfigHistoryStorageData, ConfigKey, Page};
use crate::traits::HistoryPersistence;

/// Build ext_info JSON from tags and config entity for history records
fn build_ext_info(tags: &[String], entity: &config_info::Model) -> String {
    let mut ext = serde_json::Map::new();
    if !tags.is_empty() {
        ext.insert(
            "config_tags".to_string(),
            serde_json::Value::String(tags.join(",")),
        );
    }
    let fields = [
        ("desc", &entity.c_desc),
        ("use", &entity.c_use),
        ("effect", &entity.effect),
        ("type", &entity.r#type),
        ("schema", &entity.c_schema),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            ext.insert(name.to_string(), serde_json::Value::String(value.clone()));
        }
    }
    serde_json::Value::Object(ext).to_string()
}

fn build_gray_ext_info(entity: &config_info_gray::Model, src_user: &str) -> String {
    serde_json::json!({
        "gray_name": entity.gray_name,
        "gray_rule": entity.gray_rule,
        "src_user": src_user,
    })
    .to_string()
}

/// History row snapshotting a base config
pub(crate) fn formal_history(
    entity: &config_info::Model,
    tags: &[String],
    op_type: &str,
    src_ip: &str,
    src_user: &str,
) -> his_config_info::ActiveModel {
    let now = now();
    his_config_info::ActiveModel {
        id: Set(entity.id),
        data_id: Set(entity.data_id.clone()),
        group_id: Set(entity.group_id.clone()),
        app_name: Set(entity.app_name.clone()),
        content: Set(entity.content.clone()),
        md5: Set(entity.md5.clone()),
        gmt_create: Set(now),
        gmt_modified: Set(now),
        src_user: Set(Some(src_user.to_string())),
        src_ip: Set(Some(src_ip.to_string())),
        op_type: Set(Some(op_type.to_string())),
        tenant_id: Set(entity.tenant_id.clone()),
        encrypted_data_key: Set(entity.encrypted_data_key.clone()),
        publish_type: Set(Some(PUBLISH_TYPE_FORMAL.to_string())),
        gray_name: Set(None),
        ext_info: Set(Some(build_ext_info(tags, entity))),
        ..Default::default()
    }
}

/// History row snapshotting a gray config
pub(crate) fn gray_history(
    entity: &config_info_gray::Model,
    op_type: &str,
    src_ip: &str,
    src_user: &str,
) -> his_config_info::ActiveModel {
    let now = now();
    his_config_info::ActiveModel {
        id: Set(entity.id),
        data_id: Set(entity.data_id.clone()),
        group_id: Set(entity.group_id.clone()),
        app_name: Set(entity.app_name.clone()),
        content: Set(entity.content.clone()),
        md5: Set(entity.md5.clone()),
        gmt_create: Set(now),
        gmt_modified: Set(now),
        src_user: Set(Some(src_user.to_string())),
        src_ip: Set(Some(src_ip.to_string())),
        op_type: Set(Some(op_type.to_string())),
        tenant_id: Set(entity.tenant_id.clone()),
        encrypted_data_key: Set(entity.encrypted_data_key.clone()),
        publish_type: Set(Some(PUBLISH_TYPE_GRAY.to_string())),
        gray_name: Set(Some(entity.gray_name.clone())),
        ext_info: Set(Some(build_gray_ext_info(entity, src_user))),
        ..Default::default()
    }
}

pub(crate) async fn insert_history<C: ConnectionTrait>(
    conn: &C,
    history: his_config_info::ActiveModel,
) -> Result<(), DbErr> {
    his_config_info::Entity::insert(history).exec(conn).await?;
    Ok(())
}

fn history_entity_to_storage(model: his_config_info::Model) -> ConfigHistoryStorageData {
    ConfigHistoryStorageData {
        nid: model.nid,
        id: model.id,
        data_id: model.data_id,
        group: model.group_id,
        tenant: model.tenant_id,
        content: model.content,
        md5: model.md5.unwrap_or_default(),
        app_name: model.app_name.unwrap_or_default(),
        src_user: model.src_user.unwrap_or_default(),
        src_ip: model.src_ip.unwrap_or_default(),
        op_type: model.op_type.unwrap_or_default(),
        publish_type: model.publish_type.unwrap_or_default(),
        gray_name: model.gray_name.unwrap_or_default(),
        ext_info: model.ext_info.unwrap_or_default(),
        encrypted_data_key: model.encrypted_data_key.unwrap_or_default(),
        created_time: to_millis(model.gmt_create),
        modified_time: to_millis(model.gmt_modified),
    }
}

#[async_trait]
impl HistoryPersistence for ExternalDbPersistService {
    async fn history_search_page(
        &self,
        key: &ConfigKey,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigHistoryStorageData>> {
        let select = his_config_info::Entity::find()
            .filter(his_config_info::Column::DataId.eq(key.data_id.as_str()))
            .filter(his_config_info::Column::GroupId.eq(key.group.as_str()))
            .filter(his_config_info::Column::TenantId.eq(key.tenant.as_str()));

        let total_count = select.clone().count(&self.db).await?;
        if total_count == 0 {
            return Ok(Page::empty());
        }

        let items = select
            .order_by_desc(his_config_info::Column::Nid)
            .offset(page_offset(page_no, page_size))
            .limit(page_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(history_entity_to_storage)
            .collect();

        Ok(Page::new(total_count, page_no, page_size, items))
    }

    async fn history_find_by_nid(
        &self,
        nid: i64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>> {
        Ok(his_config_info::Entity::find_by_id(nid)
            .one(&self.db)
            .await?
            .map(history_entity_to_storage))
    }

    async fn history_find_previous(
        &self,
        id: i64,
        nid: i64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>> {
        Ok(his_config_info::Entity::find()
            .filter(his_config_info::Column::Id.eq(id))
            .filter(his_config_info::Column::Nid.lt(nid))
            .order_by_desc(his_config_info::Column::Nid)
            .one(&self.db)
            .await?
            .map(history_entity_to_storage))
    }

    async fn history_count_before(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64> {
        Ok(his_config_info::Entity::find()
            .filter(his_config_info::Column::GmtModified.lt(cutoff))
            .count(&self.db)
            .await?)
    }

    async fn history_remove_before(
        &self,
        cutoff: NaiveDateTime,
        limit: u64,
    ) -> anyhow::Result<u64> {
        let nids = his_config_info::Entity::find()
            .select_only()
            .column(his_config_info::Column::Nid)
            .filter(his_config_info::Column::GmtModified.lt(cutoff))
            .order_by_asc(his_config_info::Column::Nid)
            .limit(limit)
            .into_tuple::<i64>()
            .all(&self.db)
            .await?;

        if nids.is_empty() {
            return Ok(0);
        }

        let result = his_config_info::Entity::delete_many()
            .filter(his_config_info::Column::Nid.is_in(nids))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use quince_common::{OP_TYPE_DELETE, OP_TYPE_INSERT, OP_TYPE_UPDATE};

    use crate::sql::test_support::{info, key, setup};
    use crate::traits::ConfigPersistence;

    #[test]
    fn test_build_ext_info() {
        let entity = config_info::Model {
            id: 1,
            data_id: "app.yaml".to_string(),
            group_id: "DEFAULT_GROUP".to_string(),
            content: "a=1".to_string(),
            md5: None,
            gmt_create: now(),
            gmt_modified: now(),
            src_user: None,
            src_ip: None,
            app_name: None,
            tenant_id: String::new(),
            c_desc: Some("billing settings".to_string()),
            c_use: None,
            effect: None,
            r#type: Some("yaml".to_string()),
            c_schema: None,
            encrypted_data_key: None,
        };
        let ext: serde_json::Value =
            serde_json::from_str(&build_ext_info(&["a".to_string(), "b".to_string()], &entity))
                .unwrap();

        assert_eq!(ext["config_tags"], "a,b");
        assert_eq!(ext["desc"], "billing settings");
        assert_eq!(ext["type"], "yaml");
        assert!(ext.get("schema").is_none());
    }

    #[tokio::test]
    async fn test_history_records_insert_update_delete() {
        let service = setup().await;

        let inserted = service
            .config_insert(&info("app.yaml", "v1"), None, "10.0.0.1", "alice")
            .await
            .unwrap();
        service
            .config_update(&info("app.yaml", "v2"), None, "10.0.0.1", "alice")
            .await
            .unwrap();
        service
            .config_remove(&key("app.yaml"), "10.0.0.1", "alice")
            .await
            .unwrap();

        let page = service
            .history_search_page(&key("app.yaml"), 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total_count, 3);

        // newest first
        let ops: Vec<&str> = page.page_items.iter().map(|h| h.op_type.as_str()).collect();
        assert_eq!(ops, vec![OP_TYPE_DELETE, OP_TYPE_UPDATE, OP_TYPE_INSERT]);

        let contents: Vec<&str> = page.page_items.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["v2", "v1", "v1"]);

        assert!(page.page_items.iter().all(|h| h.id == inserted.id));
        assert!(page.page_items.iter().all(|h| h.publish_type == "formal"));
        assert_eq!(page.page_items[0].src_user, "alice");
    }

    #[tokio::test]
    async fn test_history_find_by_nid_and_previous() {
        let service = setup().await;
        service
            .config_insert(&info("app.yaml", "v1"), None, "", "")
            .await
            .unwrap();
        service
            .config_update(&info("app.yaml", "v2"), None, "", "")
            .await
            .unwrap();

        let page = service
            .history_search_page(&key("app.yaml"), 1, 10)
            .await
            .unwrap();
        let latest = &page.page_items[0];

        let found = service
            .history_find_by_nid(latest.nid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, *latest);

        let previous = service
            .history_find_previous(latest.id, latest.nid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.op_type, OP_TYPE_INSERT);
        assert!(
            service
                .history_find_previous(previous.id, previous.nid)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_history_remove_before_respects_limit() {
        let service = setup().await;
        service
            .config_insert(&info("app.yaml", "v1"), None, "", "")
            .await
            .unwrap();
        for version in 2..=4 {
            service
                .config_update(&info("app.yaml", &format!("v{}", version)), None, "", "")
                .await
                .unwrap();
        }

        let future = now() + Duration::hours(1);
        assert_eq!(service.history_count_before(future).await.unwrap(), 4);

        let past = now() - Duration::hours(1);
        assert_eq!(service.history_remove_before(past, 10).await.unwrap(), 0);

        assert_eq!(service.history_remove_before(future, 3).await.unwrap(), 3);
        assert_eq!(service.history_count_before(future).await.unwrap(), 1);

        // the newest entry survives
        let page = service
            .history_search_page(&key("app.yaml"), 1, 10)
            .await
            .unwrap();
        assert_eq!(page.page_items[0].content, "v3");
    }
}
