//! `TenantPersistence` implementation over `tenant_info`

use async_trait::async_trait;
use sea_orm::*;

use quince_common::QuinceError;

use super::{ExternalDbPersistService, is_unique_violation};
use crate::entity::tenant_info;
use crate::model::TenantStorageData;
use crate::traits::TenantPersistence;

fn tenant_entity_to_storage(model: tenant_info::Model) -> TenantStorageData {
    TenantStorageData {
        kp: model.kp,
        tenant_id: model.tenant_id,
        tenant_name: model.tenant_name,
        tenant_desc: model.tenant_desc.unwrap_or_default(),
        create_source: model.create_source.unwrap_or_default(),
        created_time: model.gmt_create,
        modified_time: model.gmt_modified,
    }
}

fn tenant_condition(kp: &str, tenant_id: &str) -> Condition {
    Condition::all()
        .add(tenant_info::Column::Kp.eq(kp))
        .add(tenant_info::Column::TenantId.eq(tenant_id))
}

#[async_trait]
impl TenantPersistence for ExternalDbPersistService {
    async fn tenant_insert(
        &self,
        kp: &str,
        tenant_id: &str,
        tenant_name: &str,
        tenant_desc: &str,
        create_source: &str,
    ) -> anyhow::Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let entity = tenant_info::ActiveModel {
            kp: Set(kp.to_string()),
            tenant_id: Set(tenant_id.to_string()),
            tenant_name: Set(tenant_name.to_string()),
            tenant_desc: Set(Some(tenant_desc.to_string())),
            create_source: Set(Some(create_source.to_string())),
            gmt_create: Set(now),
            gmt_modified: Set(now),
            ..Default::default()
        };

        match tenant_info::Entity::insert(entity).exec(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(QuinceError::UniquenessConflict(format!("kp={}, tenant={}", kp, tenant_id)).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn tenant_update(
        &self,
        kp: &str,
        tenant_id: &str,
        tenant_name: &str,
        tenant_desc: &str,
    ) -> anyhow::Result<bool> {
        let Some(existing) = tenant_info::Entity::find()
            .filter(tenant_condition(kp, tenant_id))
            .one(&self.db)
            .await?
        else {
            return Ok(false);
        };

        let mut active: tenant_info::ActiveModel = existing.into();
        active.tenant_name = Set(tenant_name.to_string());
        active.tenant_desc = Set(Some(tenant_desc.to_string()));
        active.gmt_modified = Set(chrono::Utc::now().timestamp_millis());
        active.update(&self.db).await?;

        Ok(true)
    }

    async fn tenant_find_by_kp(&self, kp: &str) -> anyhow::Result<Vec<TenantStorageData>> {
        Ok(tenant_info::Entity::find()
            .filter(tenant_info::Column::Kp.eq(kp))
            .order_by_asc(tenant_info::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(tenant_entity_to_storage)
            .collect())
    }

    async fn tenant_find_one(
        &self,
        kp: &str,
        tenant_id: &str,
    ) -> anyhow::Result<Option<TenantStorageData>> {
        Ok(tenant_info::Entity::find()
            .filter(tenant_condition(kp, tenant_id))
            .one(&self.db)
            .await?
            .map(tenant_entity_to_storage))
    }

    async fn tenant_remove(&self, kp: &str, tenant_id: &str) -> anyhow::Result<bool> {
        let result = tenant_info::Entity::delete_many()
            .filter(tenant_condition(kp, tenant_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn tenant_count_by_id(&self, tenant_id: &str) -> anyhow::Result<u64> {
        Ok(tenant_info::Entity::find()
            .filter(tenant_info::Column::TenantId.eq(tenant_id))
            .count(&self.db)
            .await?)
    }
}
