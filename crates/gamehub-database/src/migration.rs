//! Database migration runner.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::{debug, info};

use gamehub_core::error::{AppError, ErrorKind};
use gamehub_core::result::AppResult;

/// Migrations embedded from the workspace `migrations/` directory.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Run all pending database migrations.
///
/// Returns the number of migrations known to this build.
pub async fn run_migrations(pool: &PgPool) -> AppResult<usize> {
    info!("Running database migrations...");

    for migration in MIGRATOR.iter() {
        debug!(
            version = migration.version,
            description = %migration.description,
            "Known migration"
        );
    }

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    let count = MIGRATOR.iter().count();
    info!(migrations = count, "Database migrations completed successfully");
    Ok(count)
}
