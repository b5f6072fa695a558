//! Dispatch error taxonomy shared by the registry, dispatcher, and executor.

use std::time::Duration;

use gamehub_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Errors produced while resolving or running extension code.
///
/// Failures are returned as values; nothing in the dispatch path panics on
/// behalf of extension code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// No plugin with this name is loaded, or it failed to load.
    #[error("plugin '{0}' not found")]
    PluginNotFound(String),

    /// The module exports no function with this name.
    #[error("function '{name}/{arity}' not found")]
    FunctionNotFound {
        /// Function name.
        name: String,
        /// Arity the caller used.
        arity: usize,
    },

    /// The function exists but not with the arity the caller used.
    #[error("function '{name}' is exported with arity {expected:?}, called with {given}")]
    ArityMismatch {
        /// Function name.
        name: String,
        /// Arities the module exports under this name.
        expected: Vec<usize>,
        /// Arity the caller used.
        given: usize,
    },

    /// The plugin registered no export under this hook name.
    #[error("export '{hook}' is not registered for plugin '{plugin}'")]
    ExportNotFound {
        /// Plugin name.
        plugin: String,
        /// Hook name.
        hook: String,
    },

    /// Blocked by the allow-list or by scheduled-callback protection.
    #[error("function '{0}' is not allowed")]
    NotAllowed(String),

    /// The callee did not finish within its budget and was abandoned.
    #[error("'{name}' timed out after {after:?}")]
    Timeout {
        /// Function name.
        name: String,
        /// Budget that was exceeded.
        after: Duration,
    },

    /// The callee returned an error or panicked.
    #[error("'{name}' failed: {detail}")]
    Exception {
        /// Function name.
        name: String,
        /// Error detail reported by the callee.
        detail: String,
    },

    /// The call executor had no free slot; the call was dropped.
    #[error("call executor saturated, '{0}' dropped")]
    Overloaded(String),

    /// No extension module is configured on the dispatcher.
    #[error("no extension module configured")]
    NotConfigured,

    /// An entry of a startup export list failed validation.
    #[error("invalid export at index {index}: {reason}")]
    InvalidExport {
        /// Zero-based position in the export list.
        index: usize,
        /// Why the entry was rejected.
        reason: String,
    },
}

impl HookError {
    /// Maps this error onto the application-wide error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PluginNotFound(_)
            | Self::FunctionNotFound { .. }
            | Self::ArityMismatch { .. }
            | Self::ExportNotFound { .. }
            | Self::NotConfigured => ErrorKind::NotFound,
            Self::NotAllowed(_) => ErrorKind::NotAllowed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Exception { .. } => ErrorKind::CalleeFailure,
            Self::Overloaded(_) => ErrorKind::ServiceUnavailable,
            Self::InvalidExport { .. } => ErrorKind::Validation,
        }
    }

    /// Whether the failure originated inside extension code.
    pub fn is_callee_failure(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Exception { .. })
    }
}

impl From<HookError> for AppError {
    fn from(err: HookError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}
