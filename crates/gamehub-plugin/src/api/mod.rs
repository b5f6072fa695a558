//! Host API exposed to extension code.

pub mod context;
pub mod schedule;
