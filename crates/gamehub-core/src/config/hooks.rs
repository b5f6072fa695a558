//! Hook dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the hook dispatcher and the bounded call executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    /// Name of the extension module that receives lifecycle callbacks.
    ///
    /// `None` means no extension is installed and every lifecycle callback
    /// resolves to its safe default.
    #[serde(default)]
    pub module: Option<String>,
    /// Execution budget for a single extension call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Names callable through the guarded RPC path. `None` disables the check.
    #[serde(default)]
    pub allow_list: Option<Vec<String>>,
    /// Maximum number of extension calls in flight at once.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

impl HookConfig {
    /// Returns the execution budget as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            module: None,
            timeout_ms: default_timeout_ms(),
            allow_list: None,
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_concurrent_calls() -> usize {
    64
}
