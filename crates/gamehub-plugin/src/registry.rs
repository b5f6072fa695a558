//! Plugin registry: discovers plugins on disk, loads their packages, and
//! routes RPC calls to their hooks modules.
//!
//! Layout under the plugin root:
//!
//! ```text
//! plugins/
//!   sample/
//!     lib/                 compiled code + plugin.toml
//!     deps/
//!       shared_utils/lib/  dependency code, also placed on the search path
//! ```
//!
//! A reload rebuilds the whole state from scratch and swaps it in atomically.
//! Plugins that fail any step stay listed with an `Error` status; they never
//! abort the scan.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use gamehub_core::config::PluginConfig;

use crate::api::context::{CallContext, CallOptions, HostServices};
use crate::error::HookError;
use crate::executor::{CallExecutor, Invocation};
use crate::exports::ExportRegistry;
use crate::hooks::policy::CallPolicy;
use crate::loader::{PackageLoader, PluginPackage, SearchPath};
use crate::manifest::PluginManifest;
use crate::module::{HookModule, STARTUP_FUNCTION};

/// Load status of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PluginStatus {
    /// Loaded and started.
    Ok,
    /// Load failed; the plugin is unusable.
    Error(String),
}

impl PluginStatus {
    /// Whether the plugin loaded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// What the registry knows about one plugin directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Directory name under the plugin root.
    pub name: String,
    /// Package identifier handed to the loader.
    pub package_id: String,
    /// Search-path entries contributed by this plugin, in order.
    pub code_directories: Vec<PathBuf>,
    /// Resolved hooks module, when the manifest named a parseable one.
    pub hooks_module: Option<String>,
    /// Modules the package provided.
    pub modules: BTreeSet<String>,
    /// Load status.
    pub status: PluginStatus,
    /// When the plugin finished loading.
    pub loaded_at: Option<DateTime<Utc>>,
    /// Package version from the manifest or the package.
    pub version: Option<String>,
}

impl PluginDescriptor {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            package_id: name.to_string(),
            code_directories: Vec::new(),
            hooks_module: None,
            modules: BTreeSet::new(),
            status: PluginStatus::Error("not loaded".to_string()),
            loaded_at: None,
            version: None,
        }
    }
}

/// Outcome of running one plugin's startup hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartupOutcome {
    /// The hook ran and its export list was registered.
    Registered {
        /// Number of exports registered.
        exports: usize,
    },
    /// The hooks module exports no startup hook.
    NoStartupHook,
    /// The hook failed or returned an invalid export list.
    Failed {
        /// Failure detail.
        reason: String,
    },
}

/// Result of [`PluginRegistry::reload_and_run_startup_hooks`].
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    /// Every plugin found, loaded or not.
    pub plugins: Vec<PluginDescriptor>,
    /// Startup outcome per successfully loaded plugin.
    pub startup_results: BTreeMap<String, StartupOutcome>,
}

/// Directory conventions inside the plugin root.
#[derive(Debug, Clone)]
pub struct PluginLayout {
    /// Compiled-code subdirectory of each plugin and dependency.
    pub code_dir: String,
    /// Dependency subdirectory of each plugin.
    pub deps_dir: String,
    /// Manifest file inside the compiled-code directory.
    pub manifest_file: String,
}

impl Default for PluginLayout {
    fn default() -> Self {
        Self::from_config(&PluginConfig::default())
    }
}

impl PluginLayout {
    /// Reads the layout from the `[plugins]` configuration section.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            code_dir: config.code_dir.clone(),
            deps_dir: config.deps_dir.clone(),
            manifest_file: config.manifest_file.clone(),
        }
    }
}

#[derive(Debug)]
struct LoadedPlugin {
    descriptor: PluginDescriptor,
    hooks: Option<Arc<dyn HookModule>>,
}

#[derive(Debug, Default)]
struct RegistryState {
    plugins: BTreeMap<String, LoadedPlugin>,
    /// Module name to module, across every started package.
    modules: HashMap<String, Arc<dyn HookModule>>,
    search_path: SearchPath,
}

/// Scratch state for one scan.
#[derive(Default)]
struct ScanState {
    state: RegistryState,
    started: HashMap<String, Arc<dyn PluginPackage>>,
}

/// Registry of plugins discovered under one root directory.
#[derive(Debug)]
pub struct PluginRegistry {
    root: PathBuf,
    layout: PluginLayout,
    loader: Arc<dyn PackageLoader>,
    exports: Arc<ExportRegistry>,
    executor: CallExecutor,
    services: HostServices,
    policy: Arc<CallPolicy>,
    state: RwLock<Arc<RegistryState>>,
    reload_lock: Mutex<()>,
}

impl PluginRegistry {
    /// Creates an empty registry. Nothing is loaded until
    /// [`reload`](Self::reload) runs.
    pub fn new(
        root: impl Into<PathBuf>,
        layout: PluginLayout,
        loader: Arc<dyn PackageLoader>,
        exports: Arc<ExportRegistry>,
        executor: CallExecutor,
        services: HostServices,
    ) -> Self {
        Self {
            root: root.into(),
            layout,
            loader,
            exports,
            executor,
            services,
            policy: Arc::new(CallPolicy::default()),
            state: RwLock::new(Arc::new(RegistryState::default())),
            reload_lock: Mutex::new(()),
        }
    }

    /// Shares a call policy whose protected callbacks RPC must refuse.
    pub fn with_policy(mut self, policy: Arc<CallPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Plugin root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The export registry startup hooks write into.
    pub fn exports(&self) -> &Arc<ExportRegistry> {
        &self.exports
    }

    /// Rescans the plugin root, replaces the registry state, and clears
    /// every export.
    pub async fn reload(&self) -> Vec<PluginDescriptor> {
        let _guard = self.reload_lock.lock().await;
        self.reload_locked().await
    }

    /// Reloads, then runs each loaded plugin's startup hook and registers
    /// what it returns.
    pub async fn reload_and_run_startup_hooks(&self) -> StartupReport {
        let _guard = self.reload_lock.lock().await;
        let plugins = self.reload_locked().await;

        let mut startup_results = BTreeMap::new();
        for descriptor in plugins.iter().filter(|d| d.status.is_ok()) {
            let outcome = self.run_startup_hook(&descriptor.name).await;
            match &outcome {
                StartupOutcome::Failed { reason } => {
                    warn!(plugin = %descriptor.name, error = %reason, "Startup hook failed")
                }
                other => debug!(plugin = %descriptor.name, outcome = ?other, "Startup hook finished"),
            }
            startup_results.insert(descriptor.name.clone(), outcome);
        }

        StartupReport {
            plugins,
            startup_results,
        }
    }

    /// All plugin descriptors, sorted by name.
    pub async fn list(&self) -> Vec<PluginDescriptor> {
        let state = self.snapshot().await;
        state
            .plugins
            .values()
            .map(|p| p.descriptor.clone())
            .collect()
    }

    /// One plugin's descriptor.
    pub async fn lookup(&self, plugin_name: &str) -> Result<PluginDescriptor, HookError> {
        let state = self.snapshot().await;
        state
            .plugins
            .get(plugin_name)
            .map(|p| p.descriptor.clone())
            .ok_or_else(|| HookError::PluginNotFound(plugin_name.to_string()))
    }

    /// A module by name from any started package.
    pub async fn module(&self, module_name: &str) -> Option<Arc<dyn HookModule>> {
        self.snapshot().await.modules.get(module_name).cloned()
    }

    /// The current search path.
    pub async fn search_path(&self) -> SearchPath {
        self.snapshot().await.search_path.clone()
    }

    /// Calls a function on a plugin's hooks module.
    ///
    /// Protected scheduled callbacks are refused at any arity. Statically
    /// exported `function/arity` runs directly. Otherwise a name the plugin
    /// registered as an export goes through the module's custom hook entry
    /// point.
    pub async fn call_rpc(
        &self,
        plugin_name: &str,
        function: &str,
        args: Vec<Value>,
        opts: CallOptions,
    ) -> Result<Value, HookError> {
        let module = self.hooks_module(plugin_name).await?;
        if self.policy.is_protected(function) {
            debug!(plugin = %plugin_name, hook = %function, "RPC rejected, callback is protected");
            return Err(HookError::NotAllowed(function.to_string()));
        }
        let arity = args.len();
        let ctx = CallContext::new(opts.caller, self.services.clone()).for_plugin(plugin_name);

        if module.exports_function(function, arity) {
            return self
                .executor
                .run(Invocation::function(module, function, args, ctx), opts.timeout)
                .await;
        }

        if self.exports.allowed(plugin_name, function) {
            debug!(plugin = %plugin_name, hook = %function, "Dispatching registered export");
            return self
                .executor
                .run(
                    Invocation::custom_hook(module, function, args, ctx),
                    opts.timeout,
                )
                .await;
        }

        let expected = module.arities(function);
        Err(if expected.is_empty() {
            HookError::FunctionNotFound {
                name: function.to_string(),
                arity,
            }
        } else {
            HookError::ArityMismatch {
                name: function.to_string(),
                expected,
                given: arity,
            }
        })
    }

    async fn snapshot(&self) -> Arc<RegistryState> {
        self.state.read().await.clone()
    }

    async fn hooks_module(&self, plugin_name: &str) -> Result<Arc<dyn HookModule>, HookError> {
        let state = self.snapshot().await;
        state
            .plugins
            .get(plugin_name)
            .and_then(|p| p.hooks.clone())
            .ok_or_else(|| HookError::PluginNotFound(plugin_name.to_string()))
    }

    async fn run_startup_hook(&self, plugin_name: &str) -> StartupOutcome {
        let module = match self.hooks_module(plugin_name).await {
            Ok(module) => module,
            Err(e) => {
                return StartupOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        if !module.exports_function(STARTUP_FUNCTION, 0) {
            return StartupOutcome::NoStartupHook;
        }

        let ctx = CallContext::new(None, self.services.clone()).for_plugin(plugin_name);
        let result = self
            .executor
            .run(
                Invocation::function(module, STARTUP_FUNCTION, Vec::new(), ctx),
                None,
            )
            .await
            .and_then(|exports| {
                let exports = if exports.is_null() {
                    Value::Array(Vec::new())
                } else {
                    exports
                };
                self.exports.register_exports(plugin_name, &exports)
            });

        match result {
            Ok(exports) => StartupOutcome::Registered { exports },
            Err(e) => StartupOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn reload_locked(&self) -> Vec<PluginDescriptor> {
        let state = self.scan().await;
        // Exports belong to the code that registered them.
        self.exports.reset_all();
        let descriptors: Vec<PluginDescriptor> = state
            .plugins
            .values()
            .map(|p| p.descriptor.clone())
            .collect();

        let failed = descriptors.iter().filter(|d| !d.status.is_ok()).count();
        *self.state.write().await = Arc::new(state);

        info!(
            root = %self.root.display(),
            plugins = descriptors.len(),
            failed = failed,
            "Plugins reloaded"
        );
        descriptors
    }

    async fn scan(&self) -> RegistryState {
        let mut scan = ScanState::default();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Plugin root unreadable");
                return scan.state;
            }
        };

        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                (!name.starts_with('.')).then(|| (name, entry.path()))
            })
            .collect();
        dirs.sort();

        for (name, dir) in dirs {
            let mut descriptor = PluginDescriptor::pending(&name);
            let hooks = match self.load_plugin(&mut descriptor, &dir, &mut scan).await {
                Ok(hooks) => {
                    descriptor.status = PluginStatus::Ok;
                    descriptor.loaded_at = Some(Utc::now());
                    info!(
                        plugin = %name,
                        package = %descriptor.package_id,
                        hooks_module = ?descriptor.hooks_module,
                        "Plugin loaded"
                    );
                    Some(hooks)
                }
                Err(reason) => {
                    error!(plugin = %name, error = %reason, "Plugin failed to load");
                    descriptor.status = PluginStatus::Error(reason);
                    None
                }
            };
            scan.state
                .plugins
                .insert(name, LoadedPlugin { descriptor, hooks });
        }

        scan.state
    }

    async fn load_plugin(
        &self,
        descriptor: &mut PluginDescriptor,
        dir: &Path,
        scan: &mut ScanState,
    ) -> Result<Arc<dyn HookModule>, String> {
        let code_dir = dir.join(&self.layout.code_dir);
        if !code_dir.is_dir() {
            return Err(format!(
                "compiled code directory '{}' missing",
                self.layout.code_dir
            ));
        }

        let manifest = PluginManifest::read(&code_dir.join(&self.layout.manifest_file))
            .map_err(|e| e.to_string())?;
        descriptor.package_id = manifest.package_id(&descriptor.name);
        descriptor.version = manifest.version.clone();
        let hooks_module = manifest.hooks_module_name().map_err(|e| e.to_string())?;
        descriptor.hooks_module = Some(hooks_module.clone());

        for code_dir in std::iter::once(code_dir).chain(self.dependency_dirs(dir)) {
            scan.state.search_path.push(code_dir.clone());
            descriptor.code_directories.push(code_dir);
        }

        for dependency in &manifest.dependencies {
            self.start_package(dependency, scan)
                .await
                .map_err(|e| format!("dependency '{dependency}': {e}"))?;
        }
        let package = self.start_package(&descriptor.package_id, scan).await?;

        if descriptor.version.is_none() {
            descriptor.version = package.version().map(str::to_string);
        }
        let modules = package.modules();
        descriptor.modules = modules.iter().map(|m| m.name().to_string()).collect();

        modules
            .into_iter()
            .find(|m| m.name() == hooks_module)
            .ok_or_else(|| {
                format!(
                    "hooks module '{}' not found in package '{}'",
                    hooks_module, descriptor.package_id
                )
            })
    }

    /// Loads and starts a package once per scan, publishing its modules.
    async fn start_package(
        &self,
        package_id: &str,
        scan: &mut ScanState,
    ) -> Result<Arc<dyn PluginPackage>, String> {
        if let Some(package) = scan.started.get(package_id) {
            return Ok(package.clone());
        }

        let package = self
            .loader
            .load(package_id, &scan.state.search_path)
            .map_err(|e| e.to_string())?;

        let starting = package.clone();
        self.executor
            .guard(
                &format!("{package_id}:start"),
                self.executor.default_timeout(),
                async move { starting.start().await },
            )
            .await
            .map_err(|e| format!("package start failed: {e}"))?;

        for module in package.modules() {
            let name = module.name().to_string();
            if scan.state.modules.insert(name.clone(), module).is_some() {
                warn!(module = %name, package = %package_id, "Module name shadowed by later package");
            }
        }
        scan.started.insert(package_id.to_string(), package.clone());
        Ok(package)
    }

    fn dependency_dirs(&self, plugin_dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(plugin_dir.join(&self.layout.deps_dir)) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path().join(&self.layout.code_dir))
            .filter(|dir| dir.is_dir())
            .collect();
        dirs.sort();
        dirs
    }
}
