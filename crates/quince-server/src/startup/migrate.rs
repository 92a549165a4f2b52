//! Startup data migrations

use tracing::info;

use quince_config::ConfigMigrateService;

use crate::model::Configuration;

/// Run the migrations enabled in `configuration`
///
/// A failed namespace migration aborts startup.
pub async fn run_startup_migrations(
    configuration: &Configuration,
    migrate: &ConfigMigrateService,
) -> anyhow::Result<()> {
    if configuration.gray_migrate_enabled() {
        let migrated = migrate.migrate_beta_and_tag_to_gray().await?;
        info!(migrated, "Gray model migration completed");
    }

    if configuration.namespace_migrate_enabled() {
        let report = migrate.namespace_migrate().await?;
        info!(
            inserted = report.inserted + report.gray_inserted,
            updated = report.updated + report.gray_updated,
            skipped = report.skipped,
            "Namespace migration completed"
        );
    }

    Ok(())
}
