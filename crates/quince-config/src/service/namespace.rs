//! Namespace service
//!
//! Namespaces are tenants registered under the console key prefix. The default
//! namespace is implicit and always listed first.

use std::sync::Arc;

use tracing::info;

use quince_common::{DEFAULT_KP, QuinceError};
use quince_persistence::{ConfigPersistence, PersistenceService, TenantPersistence};

use super::is_uniqueness_conflict;
use crate::model::{DEFAULT_CREATE_SOURCE, DEFAULT_NAMESPACE_ID, Namespace};
use crate::validation::validate_identifier;

const MAX_NAMESPACE_ID_LENGTH: usize = 128;

fn is_default_namespace(namespace_id: &str) -> bool {
    namespace_id.is_empty() || namespace_id == DEFAULT_NAMESPACE_ID
}

#[derive(Clone)]
pub struct NamespaceService {
    persistence: Arc<dyn PersistenceService>,
}

impl NamespaceService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    /// All namespaces with their config counts, default first
    pub async fn find_all(&self) -> anyhow::Result<Vec<Namespace>> {
        let tenants = self.persistence.tenant_find_by_kp(DEFAULT_KP).await?;

        let default_ns = Namespace {
            config_count: self.persistence.config_count_by_tenant("").await?,
            ..Namespace::default()
        };

        let mut namespaces = Vec::with_capacity(tenants.len() + 1);
        namespaces.push(default_ns);
        for tenant in tenants {
            let config_count = self
                .persistence
                .config_count_by_tenant(&tenant.tenant_id)
                .await?;
            namespaces.push(Namespace {
                config_count,
                ..Namespace::from(tenant)
            });
        }

        Ok(namespaces)
    }

    pub async fn get_by_namespace_id(&self, namespace_id: &str) -> anyhow::Result<Namespace> {
        if is_default_namespace(namespace_id) {
            return Ok(Namespace {
                config_count: self.persistence.config_count_by_tenant("").await?,
                ..Namespace::default()
            });
        }

        let Some(tenant) = self
            .persistence
            .tenant_find_one(DEFAULT_KP, namespace_id)
            .await?
        else {
            return Err(QuinceError::NamespaceNotExist(namespace_id.to_string()).into());
        };

        let config_count = self
            .persistence
            .config_count_by_tenant(namespace_id)
            .await?;
        Ok(Namespace {
            config_count,
            ..Namespace::from(tenant)
        })
    }

    pub async fn create(
        &self,
        namespace_id: &str,
        namespace_name: &str,
        namespace_desc: &str,
    ) -> anyhow::Result<()> {
        let namespace_id = namespace_id.trim();
        if is_default_namespace(namespace_id)
            || namespace_id.len() > MAX_NAMESPACE_ID_LENGTH
            || validate_identifier(namespace_id).is_err()
        {
            return Err(QuinceError::IllegalArgument(format!(
                "invalid namespace id: '{}'",
                namespace_id
            ))
            .into());
        }
        if namespace_name.trim().is_empty() {
            return Err(
                QuinceError::IllegalArgument("namespace name is required".to_string()).into(),
            );
        }

        match self
            .persistence
            .tenant_insert(
                DEFAULT_KP,
                namespace_id,
                namespace_name,
                namespace_desc,
                DEFAULT_CREATE_SOURCE,
            )
            .await
        {
            Ok(()) => {
                info!(namespace_id, "namespace created");
                Ok(())
            }
            Err(e) if is_uniqueness_conflict(&e) => {
                Err(QuinceError::NamespaceAlreadyExist(namespace_id.to_string()).into())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update(
        &self,
        namespace_id: &str,
        namespace_name: &str,
        namespace_desc: &str,
    ) -> anyhow::Result<()> {
        if !self
            .persistence
            .tenant_update(DEFAULT_KP, namespace_id, namespace_name, namespace_desc)
            .await?
        {
            return Err(QuinceError::NamespaceNotExist(namespace_id.to_string()).into());
        }
        Ok(())
    }

    /// Remove a namespace registration; its configs are left in place
    pub async fn delete(&self, namespace_id: &str) -> anyhow::Result<()> {
        if !self
            .persistence
            .tenant_remove(DEFAULT_KP, namespace_id)
            .await?
        {
            return Err(QuinceError::NamespaceNotExist(namespace_id.to_string()).into());
        }
        info!(namespace_id, "namespace deleted");
        Ok(())
    }

    /// Whether a namespace id is taken under any key prefix
    pub async fn check(&self, namespace_id: &str) -> anyhow::Result<bool> {
        Ok(self.persistence.tenant_count_by_id(namespace_id).await? > 0)
    }
}
