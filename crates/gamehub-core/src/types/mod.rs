//! Shared value types used across GameHub crates.

pub mod lock;
pub mod user;

pub use lock::{LockOutcome, ScheduleLock};
pub use user::UserRecord;
