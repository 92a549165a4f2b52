//! Namespace data models

use serde::{Deserialize, Serialize};

use quince_persistence::TenantStorageData;

/// Default namespace ID
pub const DEFAULT_NAMESPACE_ID: &str = "public";
/// Default namespace display name
pub const DEFAULT_NAMESPACE_SHOW_NAME: &str = "Public";
/// Default namespace description
pub const DEFAULT_NAMESPACE_DESCRIPTION: &str = "Public Namespace";
/// Create source recorded on namespaces registered through the service
pub const DEFAULT_CREATE_SOURCE: &str = "quince";

/// Namespace information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub namespace: String,
    pub namespace_show_name: String,
    pub namespace_desc: String,
    pub config_count: u64,
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace {
            namespace: String::from(DEFAULT_NAMESPACE_ID),
            namespace_show_name: String::from(DEFAULT_NAMESPACE_SHOW_NAME),
            namespace_desc: String::from(DEFAULT_NAMESPACE_DESCRIPTION),
            config_count: 0,
        }
    }
}

impl From<TenantStorageData> for Namespace {
    fn from(value: TenantStorageData) -> Self {
        Self {
            namespace: value.tenant_id,
            namespace_show_name: value.tenant_name,
            namespace_desc: value.tenant_desc,
            config_count: 0,
        }
    }
}
