//! Plugin discovery and build configuration.

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
///
/// The plugin root holds one subdirectory per plugin:
///
/// ```text
/// plugins/
///   sample/
///     lib/plugin.toml        <- manifest + compiled code
///     deps/json_utils/lib/   <- dependency compiled code
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Root directory scanned for plugins.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// Directory containing buildable plugin sources.
    #[serde(default = "default_sources_directory")]
    pub sources_directory: String,
    /// Whether to load plugins and run startup hooks on server start.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Program used to build plugin sources.
    #[serde(default = "default_build_program")]
    pub build_program: String,
    /// Name of the compiled-code subdirectory inside a plugin directory.
    #[serde(default = "default_code_dir")]
    pub code_dir: String,
    /// Name of the subdirectory holding dependency packages.
    #[serde(default = "default_deps_dir")]
    pub deps_dir: String,
    /// File name of the package manifest inside the compiled-code directory.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            sources_directory: default_sources_directory(),
            auto_load: true,
            build_program: default_build_program(),
            code_dir: default_code_dir(),
            deps_dir: default_deps_dir(),
            manifest_file: default_manifest_file(),
        }
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_sources_directory() -> String {
    "./plugin-sources".to_string()
}

fn default_build_program() -> String {
    "cargo".to_string()
}

fn default_code_dir() -> String {
    "lib".to_string()
}

fn default_deps_dir() -> String {
    "deps".to_string()
}

fn default_manifest_file() -> String {
    "plugin.toml".to_string()
}

fn default_true() -> bool {
    true
}
