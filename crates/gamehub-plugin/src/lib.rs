//! # gamehub-plugin
//!
//! Extensibility runtime for GameHub. Provides:
//!
//! - Plugin discovery from an on-disk layout with per-plugin load status
//! - An export registry fed by plugin startup hooks
//! - A hook dispatcher for lifecycle callbacks, guarded RPC, and scheduled
//!   callbacks, with timeouts and a bounded executor
//! - Compiled-in and (with the `dynamic` feature) shared-library package
//!   loaders
//! - A plugin builder that compiles plugin sources into the plugin root

pub mod api;
pub mod builder;
pub mod error;
pub mod executor;
pub mod exports;
pub mod ffi;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod manifest;
pub mod module;
pub mod prelude;
pub mod registry;
pub mod traits;

pub use api::context::{CallContext, CallOptions, Caller, HostServices};
pub use error::HookError;
pub use executor::{CallExecutor, CallSlot};
pub use exports::{ExportDescriptor, ExportRegistry};
pub use hooks::{CallPolicy, HookDispatcher, LifecycleHook};
pub use loader::{
    DynamicLibraryLoader, LoaderChain, PackageLoader, PluginPackage, SearchPath,
    StaticPackageLoader,
};
pub use manager::PluginManager;
pub use module::{FunctionExport, HookModule};
pub use registry::{PluginDescriptor, PluginRegistry, PluginStatus, StartupOutcome, StartupReport};
