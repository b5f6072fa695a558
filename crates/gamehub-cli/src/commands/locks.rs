//! Schedule lock maintenance commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use gamehub_core::error::AppError;
use gamehub_core::traits::schedule_lock::ScheduleLockStore;

/// Arguments for lock commands
#[derive(Debug, Args)]
pub struct LocksArgs {
    /// Lock subcommand
    #[command(subcommand)]
    pub command: LocksCommand,
}

/// Lock subcommands
#[derive(Debug, Subcommand)]
pub enum LocksCommand {
    /// List lock rows, newest first
    List {
        /// Restrict to one job
        #[arg(short, long)]
        job: Option<String>,
    },
    /// Delete lock rows older than the retention window
    Cleanup {
        /// Retention in days, overriding the configured value
        #[arg(long)]
        days: Option<u32>,
    },
}

/// Lock display row
#[derive(Debug, Serialize, Tabled)]
struct LockRow {
    /// Job name
    job: String,
    /// Period key
    period: String,
    /// Acquired at
    acquired_at: String,
}

/// Execute lock commands
pub async fn execute(
    args: &LocksArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::create_db_pool(&config).await?;
    let store = pool.schedule_locks();

    match &args.command {
        LocksCommand::List { job } => {
            let rows: Vec<LockRow> = store
                .list(job.as_deref())
                .await?
                .into_iter()
                .map(|l| LockRow {
                    job: l.job_name,
                    period: l.period_key,
                    acquired_at: l.acquired_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }
        LocksCommand::Cleanup { days } => {
            let days = days.unwrap_or(config.scheduler.lock_retention_days);
            let removed = store
                .cleanup(chrono::Duration::days(i64::from(days)))
                .await?;
            output::print_success(&format!(
                "Removed {removed} lock row(s) older than {days} day(s)"
            ));
        }
    }

    pool.close().await;
    Ok(())
}
