//! Package loading: resolving a package identifier into running code.
//!
//! [`StaticPackageLoader`] serves packages compiled into the host binary.
//! [`DynamicLibraryLoader`] opens native libraries found on the search path
//! when the `dynamic` feature is enabled. [`LoaderChain`] tries loaders in
//! order until one knows the package.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::module::HookModule;

/// A loaded package: a named bundle of hooks modules.
#[async_trait]
pub trait PluginPackage: Send + Sync + std::fmt::Debug {
    /// Package identifier, as named in plugin manifests.
    fn package_id(&self) -> &str;

    /// Package version, when the package knows it.
    fn version(&self) -> Option<&str> {
        None
    }

    /// Modules the package provides.
    fn modules(&self) -> Vec<Arc<dyn HookModule>>;

    /// Starts the package. Runs once per reload, before any module is called.
    async fn start(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Ordered, de-duplicated list of compiled-code directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Creates an empty search path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a directory unless already present.
    pub fn push(&mut self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        if self.dirs.contains(&dir) {
            return false;
        }
        self.dirs.push(dir);
        true
    }

    /// Directories in search order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Whether `dir` is on the path.
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|d| d == dir)
    }

    /// First existing file among `names` in search order.
    pub fn find_file(&self, names: &[String]) -> Option<PathBuf> {
        self.dirs
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
    }
}

/// Errors from a [`PackageLoader`].
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// This loader does not know the package.
    #[error("package '{0}' not found")]
    NotFound(String),
    /// The package was found but could not be loaded.
    #[error("package '{package}' failed to load: {reason}")]
    Failed {
        /// Package identifier.
        package: String,
        /// Why loading failed.
        reason: String,
    },
}

/// Resolves package identifiers into packages.
pub trait PackageLoader: Send + Sync + std::fmt::Debug {
    /// Loads a fresh instance of `package_id`.
    fn load(&self, package_id: &str, search_path: &SearchPath)
    -> Result<Arc<dyn PluginPackage>, LoadError>;
}

/// Constructor for a compiled-in package.
pub type PackageFactory = Arc<dyn Fn() -> Arc<dyn PluginPackage> + Send + Sync>;

/// Loader for packages compiled into the host binary.
#[derive(Default)]
pub struct StaticPackageLoader {
    factories: HashMap<String, PackageFactory>,
}

impl StaticPackageLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package constructor.
    pub fn register<F>(&mut self, package_id: &str, factory: F)
    where
        F: Fn() -> Arc<dyn PluginPackage> + Send + Sync + 'static,
    {
        self.factories
            .insert(package_id.to_string(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_package<F>(mut self, package_id: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn PluginPackage> + Send + Sync + 'static,
    {
        self.register(package_id, factory);
        self
    }

    /// Registered package identifiers, sorted.
    pub fn package_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for StaticPackageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPackageLoader")
            .field("packages", &self.package_ids())
            .finish()
    }
}

impl PackageLoader for StaticPackageLoader {
    fn load(
        &self,
        package_id: &str,
        _search_path: &SearchPath,
    ) -> Result<Arc<dyn PluginPackage>, LoadError> {
        let factory = self
            .factories
            .get(package_id)
            .ok_or_else(|| LoadError::NotFound(package_id.to_string()))?;

        let package = factory();
        if package.package_id() != package_id {
            return Err(LoadError::Failed {
                package: package_id.to_string(),
                reason: format!("factory produced package '{}'", package.package_id()),
            });
        }
        Ok(package)
    }
}

/// Tries each loader in order; the first that knows the package wins.
#[derive(Debug, Default)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn PackageLoader>>,
}

impl LoaderChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a loader.
    pub fn with(mut self, loader: Arc<dyn PackageLoader>) -> Self {
        self.loaders.push(loader);
        self
    }
}

impl PackageLoader for LoaderChain {
    fn load(
        &self,
        package_id: &str,
        search_path: &SearchPath,
    ) -> Result<Arc<dyn PluginPackage>, LoadError> {
        for loader in &self.loaders {
            match loader.load(package_id, search_path) {
                Err(LoadError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(LoadError::NotFound(package_id.to_string()))
    }
}

/// Open handles keyed by file path. Each path is opened at most once, so
/// repeated reloads reuse the handle instead of accumulating new ones.
#[cfg_attr(not(feature = "dynamic"), allow(dead_code))]
struct HandleCache<H> {
    handles: std::sync::Mutex<HashMap<PathBuf, H>>,
}

#[cfg_attr(not(feature = "dynamic"), allow(dead_code))]
impl<H> HandleCache<H> {
    fn new() -> Self {
        Self {
            handles: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Runs `with` on the handle for `path`, opening it first if needed. A
    /// failed open or a handle rejected by `check` is not cached.
    fn with_handle<T, E>(
        &self,
        path: &Path,
        open: impl FnOnce(&Path) -> Result<H, E>,
        check: impl FnOnce(&H) -> Result<(), E>,
        with: impl FnOnce(&H) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut handles = match self.handles.lock() {
            Ok(handles) => handles,
            Err(poisoned) => poisoned.into_inner(),
        };
        let handle = match handles.entry(path.to_path_buf()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let handle = open(path)?;
                check(&handle)?;
                entry.insert(handle)
            }
        };
        with(&*handle)
    }

    fn len(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or_default()
    }
}

/// Dynamic package loader using `libloading` (feature-gated).
#[cfg(feature = "dynamic")]
pub mod dynamic_loader {
    use std::sync::Arc;

    use tracing::{info, warn};

    use super::{HandleCache, LoadError, PackageLoader, PluginPackage, SearchPath};
    use crate::ffi::abi::{
        ABI_VERSION, ABI_VERSION_SYMBOL, AbiVersionFn, CREATE_SYMBOL, CreatePackageFn,
        library_file_names,
    };

    /// Loads packages from shared libraries (.so / .dll / .dylib) on the
    /// search path.
    ///
    /// Libraries are never unloaded: module trait objects point into their
    /// code for as long as the process runs. A library is opened once per
    /// path; later loads construct a fresh package from the same handle, so
    /// replacing a library file takes a host restart.
    pub struct DynamicLibraryLoader {
        libraries: HandleCache<libloading::Library>,
    }

    impl DynamicLibraryLoader {
        /// Creates a new dynamic loader.
        pub fn new() -> Self {
            Self {
                libraries: HandleCache::new(),
            }
        }

        /// Number of distinct library files opened.
        pub fn loaded_count(&self) -> usize {
            self.libraries.len()
        }

        fn open(&self, package_id: &str, path: &std::path::Path) -> Result<Arc<dyn PluginPackage>, LoadError> {
            let failed = |reason: String| LoadError::Failed {
                package: package_id.to_string(),
                reason,
            };

            let package = self.libraries.with_handle(
                path,
                // SAFETY: loading a library runs its initialisers. Only
                // trusted plugin directories are placed on the search path.
                |path| {
                    unsafe { libloading::Library::new(path) }
                        .map_err(|e| failed(format!("{}: {}", path.display(), e)))
                },
                // SAFETY: the symbol type matches what `declare_plugin!` emits.
                |library| unsafe {
                    let version: libloading::Symbol<AbiVersionFn> = library
                        .get(ABI_VERSION_SYMBOL)
                        .map_err(|e| failed(format!("missing ABI version symbol: {e}")))?;
                    let version = version();
                    if version != ABI_VERSION {
                        return Err(failed(format!(
                            "ABI version {version} does not match host ABI version {ABI_VERSION}"
                        )));
                    }
                    Ok(())
                },
                // SAFETY: the symbol type matches what `declare_plugin!` emits.
                |library| unsafe {
                    let create: libloading::Symbol<CreatePackageFn> = library
                        .get(CREATE_SYMBOL)
                        .map_err(|e| failed(format!("missing constructor symbol: {e}")))?;
                    let raw = create();
                    if raw.is_null() {
                        return Err(failed("constructor returned null".to_string()));
                    }
                    Ok(Arc::<dyn PluginPackage>::from(Box::from_raw(raw)))
                },
            )?;

            info!(package = %package_id, path = %path.display(), "Dynamic package loaded");
            Ok(package)
        }
    }

    impl Default for DynamicLibraryLoader {
        fn default() -> Self {
            Self::new()
        }
    }

    impl std::fmt::Debug for DynamicLibraryLoader {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("DynamicLibraryLoader")
                .field("loaded_count", &self.loaded_count())
                .finish()
        }
    }

    impl PackageLoader for DynamicLibraryLoader {
        fn load(
            &self,
            package_id: &str,
            search_path: &SearchPath,
        ) -> Result<Arc<dyn PluginPackage>, LoadError> {
            let Some(path) = search_path.find_file(&library_file_names(package_id)) else {
                return Err(LoadError::NotFound(package_id.to_string()));
            };
            self.open(package_id, &path).inspect_err(|e| {
                warn!(package = %package_id, error = %e, "Dynamic package load failed");
            })
        }
    }
}

/// Stub loader when the dynamic feature is not enabled.
#[cfg(not(feature = "dynamic"))]
pub mod dynamic_loader {
    use std::sync::Arc;

    use super::{LoadError, PackageLoader, PluginPackage, SearchPath};

    /// Stub dynamic loader; knows no packages.
    #[derive(Debug, Default)]
    pub struct DynamicLibraryLoader;

    impl DynamicLibraryLoader {
        /// Creates a stub loader.
        pub fn new() -> Self {
            Self
        }
    }

    impl PackageLoader for DynamicLibraryLoader {
        fn load(
            &self,
            package_id: &str,
            _search_path: &SearchPath,
        ) -> Result<Arc<dyn PluginPackage>, LoadError> {
            Err(LoadError::NotFound(package_id.to_string()))
        }
    }
}

pub use dynamic_loader::DynamicLibraryLoader;
