//! Shared test helpers for integration tests.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use gamehub_core::config::{HookConfig, PluginConfig, SchedulerConfig};
use gamehub_core::traits::schedule_lock::ScheduleLockStore;
use gamehub_plugin::{HostServices, PluginManager, StaticPackageLoader};
use gamehub_worker::{MemoryScheduleLockStore, ScheduledJobCoordinator};

/// Manifest of the reference plugin.
pub const SAMPLE_MANIFEST: &str = r#"
package = "sample"
version = "0.1.0"
hooks_module = "SampleHooks"
"#;

/// A plugin root on disk plus a runtime wired over it
pub struct TestRuntime {
    /// Plugin root, removed on drop
    pub dir: TempDir,
    /// Plugin manager over `dir`
    pub manager: PluginManager,
    /// Coordinator attached to the manager's dispatcher
    pub coordinator: Arc<ScheduledJobCoordinator>,
    /// Lock table shared with the coordinator
    pub locks: Arc<dyn ScheduleLockStore>,
}

impl TestRuntime {
    /// Create a runtime with an empty plugin root and `SampleHooks` as the
    /// configured extension module
    pub async fn new() -> Self {
        Self::with_locks(Arc::new(MemoryScheduleLockStore::new())).await
    }

    /// Create a runtime sharing an existing lock table
    pub async fn with_locks(locks: Arc<dyn ScheduleLockStore>) -> Self {
        let dir = TempDir::new().expect("Failed to create plugin root");

        let plugins = PluginConfig {
            directory: dir.path().to_string_lossy().to_string(),
            ..PluginConfig::default()
        };
        let hooks = HookConfig {
            module: Some("SampleHooks".to_string()),
            timeout_ms: 1000,
            ..HookConfig::default()
        };

        let loader = StaticPackageLoader::new().with_package(sample::PACKAGE_ID, || {
            Arc::new(sample::SamplePackage::new())
        });
        let manager = PluginManager::new(&plugins, &hooks, Arc::new(loader), HostServices::new(None));

        let coordinator = ScheduledJobCoordinator::new(
            Arc::clone(manager.dispatcher()),
            Arc::clone(&locks),
            &SchedulerConfig::default(),
        )
        .await
        .expect("Failed to create coordinator");

        Self {
            dir,
            manager,
            coordinator,
            locks,
        }
    }

    /// Install a plugin directory with the given manifest under `lib/`
    pub fn install(&self, name: &str, manifest: &str) {
        install_plugin(self.dir.path(), name, manifest);
    }

    /// Install the reference plugin as `sample`
    pub fn install_sample(&self) {
        self.install("sample", SAMPLE_MANIFEST);
    }
}

/// Write `<root>/<name>/lib/plugin.toml`
pub fn install_plugin(root: &Path, name: &str, manifest: &str) {
    let code_dir = root.join(name).join("lib");
    std::fs::create_dir_all(&code_dir).expect("Failed to create code dir");
    std::fs::write(code_dir.join("plugin.toml"), manifest).expect("Failed to write manifest");
}
