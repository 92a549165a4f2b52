//! Tenant persistence trait

use async_trait::async_trait;

use crate::model::TenantStorageData;

/// Tenant registry operations
#[async_trait]
pub trait TenantPersistence: Send + Sync {
    /// Fails with `QuinceError::UniquenessConflict` when `(kp, tenant_id)` exists
    async fn tenant_insert(
        &self,
        kp: &str,
        tenant_id: &str,
        tenant_name: &str,
        tenant_desc: &str,
        create_source: &str,
    ) -> anyhow::Result<()>;

    /// Returns false when the tenant does not exist
    async fn tenant_update(
        &self,
        kp: &str,
        tenant_id: &str,
        tenant_name: &str,
        tenant_desc: &str,
    ) -> anyhow::Result<bool>;

    async fn tenant_find_by_kp(&self, kp: &str) -> anyhow::Result<Vec<TenantStorageData>>;

    async fn tenant_find_one(
        &self,
        kp: &str,
        tenant_id: &str,
    ) -> anyhow::Result<Option<TenantStorageData>>;

    async fn tenant_remove(&self, kp: &str, tenant_id: &str) -> anyhow::Result<bool>;

    /// Number of registrations of `tenant_id` across all key prefixes
    async fn tenant_count_by_id(&self, tenant_id: &str) -> anyhow::Result<u64>;
}
