//! Database migration command.

use crate::output;
use gamehub_core::error::AppError;

/// Run all pending migrations
pub async fn execute(config_path: &str) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::create_db_pool(&config).await?;

    println!("Running database migrations...");
    let applied = gamehub_database::migration::run_migrations(pool.pool()).await?;
    output::print_success(&format!("{applied} migration(s) known, all applied."));

    pool.close().await;
    Ok(())
}
