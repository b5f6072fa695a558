//! ABI definitions for dynamic plugin packages.
//!
//! A package library built with [`declare_plugin!`](crate::declare_plugin)
//! exports two unmangled functions:
//!
//! ```text
//! gamehub_plugin_abi_version() -> u32
//! gamehub_plugin_create() -> *mut dyn PluginPackage
//! ```
//!
//! The host refuses libraries whose ABI version differs from its own, since
//! trait-object layouts are only stable within one build of this crate.

use crate::loader::PluginPackage;

/// ABI version of this build of the plugin crate.
pub const ABI_VERSION: u32 = 1;

/// Symbol of the ABI version function, NUL-terminated.
pub const ABI_VERSION_SYMBOL: &[u8] = b"gamehub_plugin_abi_version\0";

/// Symbol of the package constructor, NUL-terminated.
pub const CREATE_SYMBOL: &[u8] = b"gamehub_plugin_create\0";

/// Signature of `gamehub_plugin_abi_version`.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of `gamehub_plugin_create`.
///
/// The returned pointer comes from `Box::into_raw` and is owned by the host.
#[allow(improper_ctypes_definitions)]
pub type CreatePackageFn = unsafe extern "C" fn() -> *mut dyn PluginPackage;

/// Platform file names a package library may have.
pub fn library_file_names(package_id: &str) -> Vec<String> {
    let mut names = vec![format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        package_id,
        std::env::consts::DLL_SUFFIX
    )];
    let bare = format!("{}{}", package_id, std::env::consts::DLL_SUFFIX);
    if !names.contains(&bare) {
        names.push(bare);
    }
    names
}
