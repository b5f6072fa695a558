//! # gamehub-database
//!
//! PostgreSQL connection management, migrations, and the persistent
//! schedule lock table shared by every host in a cluster.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::PgScheduleLockStore;
