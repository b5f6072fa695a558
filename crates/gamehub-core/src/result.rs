//! Convenience result type alias for GameHub.

use crate::error::AppError;

/// A specialized `Result` type for GameHub operations.
pub type AppResult<T> = Result<T, AppError>;
