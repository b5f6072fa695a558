//! Schedule lock rows and acquisition outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted `(job, period)` execution claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLock {
    /// Name of the scheduled job.
    pub job_name: String,
    /// Key derived from the scheduled fire time.
    pub period_key: String,
    /// When the claim was made.
    pub acquired_at: DateTime<Utc>,
}

/// Result of a lock acquisition attempt.
///
/// Contention is not an error: it means another host already owns the
/// period and this host skips the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOutcome {
    /// This caller now owns the period.
    Acquired,
    /// A row already exists for the period.
    Contended,
}

impl LockOutcome {
    /// Returns whether this caller should execute the job.
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired)
    }
}
