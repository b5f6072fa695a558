//! Schedule lock repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use gamehub_core::error::{AppError, ErrorKind};
use gamehub_core::result::AppResult;
use gamehub_core::traits::schedule_lock::ScheduleLockStore;
use gamehub_core::types::lock::{LockOutcome, ScheduleLock};

/// PostgreSQL-backed schedule lock table.
///
/// Acquisition is a single `INSERT ... ON CONFLICT DO NOTHING`; the primary
/// key on `(job_name, period_key)` makes exactly one concurrent insert win.
#[derive(Debug, Clone)]
pub struct PgScheduleLockStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ScheduleLockRow {
    job_name: String,
    period_key: String,
    acquired_at: DateTime<Utc>,
}

impl From<ScheduleLockRow> for ScheduleLock {
    fn from(row: ScheduleLockRow) -> Self {
        Self {
            job_name: row.job_name,
            period_key: row.period_key,
            acquired_at: row.acquired_at,
        }
    }
}

impl PgScheduleLockStore {
    /// Create a new schedule lock repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleLockStore for PgScheduleLockStore {
    async fn try_acquire(
        &self,
        job_name: &str,
        period_key: &str,
        acquired_at: DateTime<Utc>,
    ) -> AppResult<LockOutcome> {
        let result = sqlx::query(
            "INSERT INTO schedule_locks (job_name, period_key, acquired_at) \
             VALUES ($1, $2, $3) ON CONFLICT (job_name, period_key) DO NOTHING",
        )
        .bind(job_name)
        .bind(period_key)
        .bind(acquired_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to acquire schedule lock", e))?;

        let outcome = if result.rows_affected() == 1 {
            LockOutcome::Acquired
        } else {
            LockOutcome::Contended
        };
        debug!(job = %job_name, period_key = %period_key, outcome = ?outcome, "Schedule lock attempt");
        Ok(outcome)
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM schedule_locks WHERE acquired_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to clean up schedule locks", e)
            })?;
        Ok(result.rows_affected())
    }

    async fn list(&self, job_name: Option<&str>) -> AppResult<Vec<ScheduleLock>> {
        let rows = sqlx::query_as::<_, ScheduleLockRow>(
            "SELECT job_name, period_key, acquired_at FROM schedule_locks \
             WHERE $1::TEXT IS NULL OR job_name = $1 \
             ORDER BY acquired_at DESC",
        )
        .bind(job_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list schedule locks", e))?;

        Ok(rows.into_iter().map(ScheduleLock::from).collect())
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }
}
