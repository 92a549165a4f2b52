//! SQL-based persistence backend (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Implements the persistence traits on top of a SeaORM `DatabaseConnection`.
//! Every multi-statement mutation runs in one transaction, and all statements of
//! that transaction go through the transaction handle.

mod beta;
mod config;
mod gray;
mod history;
mod migrate;
mod tag;
mod tenant;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{prelude::Expr, *};

use quince_common::QuinceError;

use crate::entity::tenant_info;
use crate::model::*;
use crate::traits::*;

/// External database persistence service
///
/// Wraps a SeaORM `DatabaseConnection` and implements all persistence traits
/// by issuing queries directly.
pub struct ExternalDbPersistService {
    db: DatabaseConnection,
}

impl ExternalDbPersistService {
    /// Create a new ExternalDbPersistService with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl PersistenceService for ExternalDbPersistService {
    fn storage_mode(&self) -> StorageMode {
        match self.db.get_database_backend() {
            DbBackend::MySql => StorageMode::MySql,
            DbBackend::Postgres => StorageMode::Postgres,
            DbBackend::Sqlite => StorageMode::Sqlite,
        }
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        // Execute a simple query to verify connectivity
        tenant_info::Entity::find()
            .select_only()
            .column_as(Expr::cust("1"), "health")
            .into_tuple::<i32>()
            .one(&self.db)
            .await?;
        Ok(())
    }
}

/// UTC wall clock stored in `gmt_create` and `gmt_modified`
pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn to_millis(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp_millis()
}

pub(crate) fn page_offset(page_no: u64, page_size: u64) -> u64 {
    page_no.max(1).saturating_sub(1).saturating_mul(page_size)
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn is_uniqueness_conflict(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<QuinceError>(),
        Some(QuinceError::UniquenessConflict(_))
    )
}

/// CAS guard on a fingerprint column
///
/// Matches rows whose md5 equals `expected`, and rows that have no fingerprint
/// yet (null or empty).
pub(crate) fn md5_matches<C: ColumnTrait>(column: C, expected: &str) -> Condition {
    Condition::any()
        .add(column.eq(expected))
        .add(column.is_null())
        .add(column.eq(""))
}

#[cfg(test)]
pub(crate) mod test_support {
    use quince_migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database};

    use super::ExternalDbPersistService;
    use crate::model::{ConfigInfo, ConfigKey};

    /// Fresh in-memory database; one pooled connection keeps every statement on it
    pub async fn setup() -> ExternalDbPersistService {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        ExternalDbPersistService::new(db)
    }

    pub fn key(data_id: &str) -> ConfigKey {
        ConfigKey::new(data_id, "DEFAULT_GROUP", "")
    }

    pub fn info(data_id: &str, content: &str) -> ConfigInfo {
        ConfigInfo {
            app_name: Some("quince-app".to_string()),
            ..ConfigInfo::new(key(data_id), content)
        }
    }

    pub fn cas_info(data_id: &str, content: &str, expected_md5: &str) -> ConfigInfo {
        ConfigInfo {
            md5: Some(expected_md5.to_string()),
            ..info(data_id, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::setup;
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(0, 10), 0);
        assert_eq!(page_offset(u64::MAX, 10), u64::MAX);
    }

    #[test]
    fn test_now_is_utc() {
        let millis = to_millis(now());
        let expected = chrono::Utc::now().timestamp_millis();
        assert!((expected - millis).abs() < 5_000, "{} vs {}", millis, expected);
    }

    #[tokio::test]
    async fn test_storage_mode_and_health_check() {
        let service = setup().await;
        assert_eq!(service.storage_mode(), StorageMode::Sqlite);
        service.health_check().await.unwrap();
    }

    #[test]
    fn test_md5_matches_sql() {
        use crate::entity::config_info;

        let sql = config_info::Entity::find()
            .filter(md5_matches(config_info::Column::Md5, "abc"))
            .build(DbBackend::MySql)
            .to_string();
        assert!(sql.contains("`md5` = 'abc'"), "{}", sql);
        assert!(sql.contains("`md5` IS NULL"), "{}", sql);
        assert!(sql.contains("`md5` = ''"), "{}", sql);
    }
}
