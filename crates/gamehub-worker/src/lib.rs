//! Scheduled jobs for GameHub extensions.
//!
//! This crate provides:
//! - A job coordinator that registers recurring jobs on a cron scheduler and
//!   runs each firing on at most one host via a shared lock table
//! - Schedule normalization from the convenience forms into cron expressions
//! - An in-memory lock store for single-node deployments and tests

pub mod lock_store;
pub mod schedule;
pub mod scheduler;

pub use lock_store::MemoryScheduleLockStore;
pub use scheduler::{FireOutcome, ScheduledJobCoordinator};
