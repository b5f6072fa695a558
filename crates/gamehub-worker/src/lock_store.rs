//! In-memory schedule lock store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use gamehub_core::result::AppResult;
use gamehub_core::traits::schedule_lock::ScheduleLockStore;
use gamehub_core::types::lock::{LockOutcome, ScheduleLock};

/// Lock table held in process memory.
///
/// Gives at-most-once execution across coordinators sharing one instance,
/// which means one process. Clusters use the PostgreSQL store.
#[derive(Debug, Default)]
pub struct MemoryScheduleLockStore {
    rows: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl MemoryScheduleLockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleLockStore for MemoryScheduleLockStore {
    async fn try_acquire(
        &self,
        job_name: &str,
        period_key: &str,
        acquired_at: DateTime<Utc>,
    ) -> AppResult<LockOutcome> {
        let mut rows = self.rows.lock().await;
        let key = (job_name.to_string(), period_key.to_string());
        if rows.contains_key(&key) {
            debug!(job = %job_name, period_key = %period_key, "Schedule lock contended");
            return Ok(LockOutcome::Contended);
        }
        rows.insert(key, acquired_at);
        Ok(LockOutcome::Acquired)
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, acquired_at| *acquired_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn list(&self, job_name: Option<&str>) -> AppResult<Vec<ScheduleLock>> {
        let rows = self.rows.lock().await;
        let mut locks: Vec<ScheduleLock> = rows
            .iter()
            .filter(|((job, _), _)| job_name.is_none_or(|name| name == job.as_str()))
            .map(|((job, period), acquired_at)| ScheduleLock {
                job_name: job.clone(),
                period_key: period.clone(),
                acquired_at: *acquired_at,
            })
            .collect();
        locks.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));
        Ok(locks)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
