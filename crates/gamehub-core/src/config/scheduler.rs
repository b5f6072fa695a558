//! Scheduled job configuration.

use serde::{Deserialize, Serialize};

/// Which backend holds the schedule lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStoreKind {
    /// Shared PostgreSQL table, safe for multi-instance deployments.
    Postgres,
    /// Process-local map, single-node deployments only.
    Memory,
}

/// Scheduled job coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Backend used for period locks.
    #[serde(default = "default_lock_store")]
    pub lock_store: LockStoreKind,
    /// Lock rows older than this many days are removed.
    #[serde(default = "default_retention_days")]
    pub lock_retention_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_store: default_lock_store(),
            lock_retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_lock_store() -> LockStoreKind {
    LockStoreKind::Postgres
}

fn default_retention_days() -> u32 {
    7
}
