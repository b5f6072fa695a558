//! Core traits defined in `gamehub-core` and implemented by other crates.

pub mod accounts;
pub mod schedule_lock;

pub use accounts::AccountsService;
pub use schedule_lock::ScheduleLockStore;
