//! Plugin manifest (`plugin.toml`) found in a plugin's compiled-code directory.
//!
//! ```toml
//! package = "sample"
//! version = "0.1.0"
//! hooks_module = "SampleHooks"    # or ":SampleHooks"
//! dependencies = ["shared_utils"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a manifest cannot be used.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest file in the compiled-code directory.
    #[error("manifest '{}' not found", .0.display())]
    Missing(PathBuf),

    /// The manifest exists but could not be read.
    #[error("manifest '{}' unreadable: {source}", .path.display())]
    Unreadable {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid TOML for this schema.
    #[error("manifest '{}' invalid: {source}", .path.display())]
    Invalid {
        /// Manifest path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The manifest declares no hooks module.
    #[error("manifest declares no hooks_module")]
    MissingHooksModule,

    /// The hooks-module reference could not be parsed.
    #[error("hooks_module {0} is not a module name")]
    InvalidHooksModule(String),
}

/// Contents of a `plugin.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Package identifier handed to the loader. Defaults to the plugin name.
    #[serde(default)]
    pub package: Option<String>,
    /// Package version.
    #[serde(default)]
    pub version: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Module within the package that implements the plugin's hooks.
    ///
    /// Kept as a raw value so a malformed reference marks the plugin as
    /// errored instead of failing the whole manifest parse.
    #[serde(default, alias = "hooksModule")]
    pub hooks_module: Option<toml::Value>,
    /// Packages started before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginManifest {
    /// Reads and parses a manifest file.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ManifestError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&contents).map_err(|source| ManifestError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Package identifier, falling back to `plugin_name`.
    pub fn package_id(&self, plugin_name: &str) -> String {
        self.package
            .clone()
            .unwrap_or_else(|| plugin_name.to_string())
    }

    /// Resolves the hooks-module name.
    pub fn hooks_module_name(&self) -> Result<String, ManifestError> {
        match &self.hooks_module {
            None => Err(ManifestError::MissingHooksModule),
            Some(toml::Value::String(raw)) => parse_module_ref(raw)
                .ok_or_else(|| ManifestError::InvalidHooksModule(format!("'{raw}'"))),
            Some(other) => Err(ManifestError::InvalidHooksModule(other.to_string())),
        }
    }
}

/// Accepts `Name` or the symbol-prefixed `:Name`.
///
/// Module names are identifiers, optionally dot-separated.
fn parse_module_ref(raw: &str) -> Option<String> {
    let name = raw.trim();
    let name = name.strip_prefix(':').unwrap_or(name);

    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    valid.then(|| name.to_string())
}
