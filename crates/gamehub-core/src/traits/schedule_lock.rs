//! Schedule lock store trait for cluster-wide at-most-once job execution.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::result::AppResult;
use crate::types::lock::{LockOutcome, ScheduleLock};

/// Shared table of `(job_name, period_key)` rows.
///
/// Implementations must make [`try_acquire`](Self::try_acquire) a single
/// atomic conditional insert: of any number of concurrent attempts for the
/// same key, exactly one observes [`LockOutcome::Acquired`]. Rows are never
/// released; their existence marks the period as taken. Two implementations
/// are provided:
/// - PostgreSQL (`INSERT ... ON CONFLICT DO NOTHING`)
/// - In-memory (using `tokio::sync::Mutex`)
#[async_trait]
pub trait ScheduleLockStore: Send + Sync + 'static {
    /// Try to take the lock row for one firing of a job.
    async fn try_acquire(
        &self,
        job_name: &str,
        period_key: &str,
        acquired_at: DateTime<Utc>,
    ) -> AppResult<LockOutcome>;

    /// Delete rows acquired before `cutoff`. Returns the number removed.
    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// List lock rows, optionally restricted to one job, newest first.
    async fn list(&self, job_name: Option<&str>) -> AppResult<Vec<ScheduleLock>>;

    /// Check that the lock backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Delete rows older than the retention window.
    async fn cleanup(&self, retention: Duration) -> AppResult<u64> {
        self.cleanup_before(Utc::now() - retention).await
    }
}
