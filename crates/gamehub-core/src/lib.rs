//! # gamehub-core
//!
//! Core crate for GameHub. Contains configuration schemas, the unified
//! error system, and the collaborator traits the extensibility runtime
//! talks to (accounts lookup and the shared schedule lock table).
//!
//! This crate has **no** internal dependencies on other GameHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
