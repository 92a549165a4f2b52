//! Domain model types for the persistence abstraction layer
//!
//! These types are used as arguments and return values of the persistence traits,
//! decoupled from the SeaORM entities.

use serde::{Deserialize, Serialize};

use quince_common::normalize_tenant;

/// Generic paginated result
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub page_items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_count: u64, page_number: u64, page_size: u64, page_items: Vec<T>) -> Self {
        Self {
            total_count,
            page_number,
            pages_available: if page_size > 0 {
                (total_count as f64 / page_size as f64).ceil() as u64
            } else {
                0
            },
            page_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_number: 0,
            pages_available: 0,
            page_items: Vec::new(),
        }
    }
}

/// Database backend behind the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    MySql,
    Postgres,
    Sqlite,
}

impl StorageMode {
    /// Infer the backend from a connection URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?;
        match scheme {
            "mysql" => Some(StorageMode::MySql),
            "postgres" | "postgresql" => Some(StorageMode::Postgres),
            "sqlite" => Some(StorageMode::Sqlite),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::MySql => write!(f, "mysql"),
            StorageMode::Postgres => write!(f, "postgresql"),
            StorageMode::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(StorageMode::MySql),
            "postgresql" => Ok(StorageMode::Postgres),
            "sqlite" => Ok(StorageMode::Sqlite),
            _ => Err(format!("Invalid storage mode: {}", s)),
        }
    }
}

/// Identity of a base, beta, tag or gray row
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigKey {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
}

impl ConfigKey {
    /// Build a key, collapsing a blank tenant to the empty string
    pub fn new(data_id: &str, group: &str, tenant: &str) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            tenant: normalize_tenant(tenant),
        }
    }

    /// Same data id and group in another tenant
    pub fn with_tenant(&self, tenant: &str) -> Self {
        Self::new(&self.data_id, &self.group, tenant)
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dataId={}, group={}, tenant={}",
            self.data_id, self.group, self.tenant
        )
    }
}

/// Content written by a publish
///
/// `md5` is only read by CAS writes, where it carries the expected fingerprint
/// of the stored row. The stored fingerprint is always recomputed from `content`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
    pub key: ConfigKey,
    pub content: String,
    /// `None` keeps the stored app name on update
    pub app_name: Option<String>,
    pub encrypted_data_key: String,
    pub md5: Option<String>,
}

impl ConfigInfo {
    pub fn new(key: ConfigKey, content: &str) -> Self {
        Self {
            key,
            content: content.to_string(),
            ..Default::default()
        }
    }
}

/// Free-form metadata attached to a base config
///
/// `config_tags` of `None` leaves the tag relations untouched on update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigAdvanceInfo {
    pub desc: Option<String>,
    pub r#use: Option<String>,
    pub effect: Option<String>,
    pub r#type: Option<String>,
    pub schema: Option<String>,
    pub config_tags: Option<String>,
}

/// Outcome of a mutation that did not raise an error
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOperateResult {
    pub success: bool,
    pub id: i64,
    /// Epoch milliseconds of the row after the write
    pub last_modified: i64,
}

impl ConfigOperateResult {
    pub fn ok(id: i64, last_modified: i64) -> Self {
        Self {
            success: true,
            id,
            last_modified,
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

/// Base config row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStorageData {
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub config_type: String,
    pub desc: String,
    pub r#use: String,
    pub effect: String,
    pub schema: String,
    pub config_tags: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Beta config row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBetaStorageData {
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub beta_ips: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Tag config row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTagStorageData {
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub tag: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Gray config row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigGrayStorageData {
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub gray_name: String,
    pub gray_rule: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Config history entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigHistoryStorageData {
    /// Surrogate key of the history row
    pub nid: i64,
    /// Id of the config or gray row this entry refers to
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub src_user: String,
    pub src_ip: String,
    pub op_type: String,
    pub publish_type: String,
    pub gray_name: String,
    pub ext_info: String,
    pub encrypted_data_key: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Tenant registry entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantStorageData {
    pub kp: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub tenant_desc: String,
    pub create_source: String,
    pub created_time: i64,
    pub modified_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_mode_display() {
        assert_eq!(StorageMode::MySql.to_string(), "mysql");
        assert_eq!(StorageMode::Postgres.to_string(), "postgresql");
        assert_eq!(StorageMode::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_storage_mode_from_str() {
        assert_eq!("mysql".parse::<StorageMode>().unwrap(), StorageMode::MySql);
        assert_eq!(
            "postgresql".parse::<StorageMode>().unwrap(),
            StorageMode::Postgres
        );
        assert!("rocksdb".parse::<StorageMode>().is_err());
    }

    #[test]
    fn test_storage_mode_from_url() {
        assert_eq!(
            StorageMode::from_url("mysql://root:pw@localhost:3306/quince"),
            Some(StorageMode::MySql)
        );
        assert_eq!(
            StorageMode::from_url("postgres://localhost/quince"),
            Some(StorageMode::Postgres)
        );
        assert_eq!(
            StorageMode::from_url("sqlite::memory:"),
            Some(StorageMode::Sqlite)
        );
        assert_eq!(StorageMode::from_url("redis://localhost"), None);
    }

    #[test]
    fn test_page_new() {
        let page = Page::<String>::new(100, 1, 10, vec!["a".to_string()]);
        assert_eq!(page.total_count, 100);
        assert_eq!(page.page_number, 1);
        assert_eq!(page.pages_available, 10);
        assert_eq!(page.page_items.len(), 1);

        let page = Page::<String>::new(11, 2, 10, vec![]);
        assert_eq!(page.pages_available, 2);
    }

    #[test]
    fn test_page_empty() {
        let page = Page::<String>::empty();
        assert_eq!(page.total_count, 0);
        assert!(page.page_items.is_empty());
    }

    #[test]
    fn test_config_key_normalizes_blank_tenant() {
        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "  ");
        assert_eq!(key.tenant, "");

        let other = key.with_tenant("dev");
        assert_eq!(other.data_id, "app.yaml");
        assert_eq!(other.tenant, "dev");
        assert_eq!(
            other.to_string(),
            "dataId=app.yaml, group=DEFAULT_GROUP, tenant=dev"
        );
    }

    #[test]
    fn test_config_operate_result() {
        let ok = ConfigOperateResult::ok(7, 1000);
        assert!(ok.success);
        assert_eq!(ok.id, 7);

        let failed = ConfigOperateResult::failed();
        assert!(!failed.success);
        assert_eq!(failed.id, 0);
    }
}
