//! Schema migrations for the config variant tables.

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_config_tables;
mod m20250301_000002_create_history_and_tenant_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_config_tables::Migration),
            Box::new(m20250301_000002_create_history_and_tenant_tables::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectOptions, Database};

    #[tokio::test]
    async fn test_up_and_down_on_sqlite() {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options).await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        let manager = SchemaManager::new(&db);
        for table in [
            "config_info",
            "config_info_beta",
            "config_info_tag",
            "config_info_gray",
            "config_tags_relation",
            "his_config_info",
            "tenant_info",
        ] {
            assert!(manager.has_table(table).await.unwrap(), "missing {}", table);
        }

        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("config_info").await.unwrap());
        assert!(!manager.has_table("tenant_info").await.unwrap());
    }

    #[test]
    fn test_migration_order() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 2);
    }
}
