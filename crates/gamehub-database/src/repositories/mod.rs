//! Repository implementations for GameHub's own tables.

pub mod schedule_lock;

pub use schedule_lock::PgScheduleLockStore;
