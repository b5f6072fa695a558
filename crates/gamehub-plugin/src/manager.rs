//! Plugin manager: wires the registry, export registry, and dispatcher
//! together from configuration.

use std::sync::Arc;

use tracing::{info, warn};

use gamehub_core::config::{HookConfig, PluginConfig};

use crate::api::context::HostServices;
use crate::builder::PluginBuilder;
use crate::executor::CallExecutor;
use crate::exports::ExportRegistry;
use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::policy::CallPolicy;
use crate::loader::PackageLoader;
use crate::registry::{PluginDescriptor, PluginLayout, PluginRegistry, StartupReport};

/// Owns the extensibility runtime of one host.
#[derive(Debug)]
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    exports: Arc<ExportRegistry>,
    dispatcher: Arc<HookDispatcher>,
    builder: PluginBuilder,
    hooks_module: Option<String>,
}

impl PluginManager {
    /// Creates a manager. Nothing is loaded until [`reload`](Self::reload).
    pub fn new(
        plugins: &PluginConfig,
        hooks: &HookConfig,
        loader: Arc<dyn PackageLoader>,
        services: HostServices,
    ) -> Self {
        let executor = CallExecutor::from_config(hooks);
        let exports = Arc::new(ExportRegistry::new());
        let policy = Arc::new(CallPolicy::new(hooks.allow_list.clone()));
        let registry = Arc::new(
            PluginRegistry::new(
                &plugins.directory,
                PluginLayout::from_config(plugins),
                loader,
                exports.clone(),
                executor.clone(),
                services.clone(),
            )
            .with_policy(policy.clone()),
        );
        let dispatcher = Arc::new(HookDispatcher::new(executor, policy, services));

        Self {
            registry,
            exports,
            dispatcher,
            builder: PluginBuilder::new(plugins),
            hooks_module: hooks.module.clone(),
        }
    }

    /// Reloads every plugin, runs startup hooks, and rebinds the configured
    /// extension module to the freshly loaded code.
    pub async fn reload(&self) -> StartupReport {
        let report = self.registry.reload_and_run_startup_hooks().await;
        self.bind_dispatcher(&report.plugins).await;
        report
    }

    async fn bind_dispatcher(&self, plugins: &[PluginDescriptor]) {
        let Some(name) = &self.hooks_module else {
            return;
        };
        match self.registry.module(name).await {
            Some(module) => self.dispatcher.configure(Some(module)).await,
            None => {
                warn!(
                    module = %name,
                    plugins = plugins.len(),
                    "Configured extension module is not provided by any loaded plugin"
                );
                self.dispatcher.configure(None).await;
            }
        }
    }

    /// Lists plugins without reloading.
    pub async fn list_plugins(&self) -> Vec<PluginDescriptor> {
        self.registry.list().await
    }

    /// Returns the plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Returns the export registry.
    pub fn exports(&self) -> &Arc<ExportRegistry> {
        &self.exports
    }

    /// Returns the hook dispatcher for firing hooks.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.dispatcher
    }

    /// Returns the plugin builder.
    pub fn builder(&self) -> &PluginBuilder {
        &self.builder
    }

    /// Logs a one-line summary of a startup report.
    pub fn log_report(report: &StartupReport) {
        let loaded = report.plugins.iter().filter(|p| p.status.is_ok()).count();
        info!(
            plugins = report.plugins.len(),
            loaded = loaded,
            startup_hooks = report.startup_results.len(),
            "Extension runtime ready"
        );
    }
}
