//! Reference GameHub plugin.
//!
//! Package `sample` provides the `SampleHooks` module:
//!
//! - `greet/1` returns `"hello <name>"`
//! - `before_lobby_create/1` normalizes lobby names and rejects empty ones
//! - `on_startup/0` schedules `daily_rewards` and exports `leaderboard_top`
//! - `daily_rewards/1` is the scheduled callback

pub mod hooks;

use std::sync::Arc;

use gamehub_plugin_sdk::prelude::*;

/// Package identifier used in `plugin.toml`.
pub const PACKAGE_ID: &str = "sample";

/// The `sample` package.
#[derive(Debug, Default)]
pub struct SamplePackage;

impl SamplePackage {
    /// Creates the package.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginPackage for SamplePackage {
    fn package_id(&self) -> &str {
        PACKAGE_ID
    }

    fn version(&self) -> Option<&str> {
        Some(env!("CARGO_PKG_VERSION"))
    }

    fn modules(&self) -> Vec<Arc<dyn HookModule>> {
        vec![hooks::sample_hooks()]
    }

    async fn start(&self) -> Result<(), String> {
        tracing::info!(package = PACKAGE_ID, "Sample package started");
        Ok(())
    }
}

#[cfg(feature = "export")]
gamehub_plugin_sdk::declare_plugin!(SamplePackage::new());
