//! Export registry: per-plugin RPC exports declared by startup hooks.
//!
//! A plugin's startup hook returns a list of maps. Each entry names a hook
//! (`hook` or `:hook`) and may carry a `meta` (or `:meta`) map. Registration
//! validates the whole list first and then replaces the plugin's previous
//! set in one step, so readers never observe a partial set.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::HookError;

/// One RPC export registered by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    /// Owning plugin.
    pub plugin_name: String,
    /// Exported hook name, `[A-Za-z0-9_]+`.
    pub hook_name: String,
    /// Free-form metadata supplied by the plugin.
    pub meta: Map<String, Value>,
}

/// Shared mapping of plugin name to registered exports.
#[derive(Debug, Default)]
pub struct ExportRegistry {
    exports: DashMap<String, Arc<Vec<ExportDescriptor>>>,
}

impl ExportRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `export_list` and replaces the plugin's export set with it.
    ///
    /// The first invalid entry rejects the whole batch and leaves the previous
    /// set untouched. Duplicate hook names keep the last entry. Returns the
    /// number of exports now registered.
    pub fn register_exports(&self, plugin_name: &str, export_list: &Value) -> Result<usize, HookError> {
        let entries = export_list.as_array().ok_or_else(|| HookError::InvalidExport {
            index: 0,
            reason: "export list must be a list of maps".to_string(),
        })?;

        let mut descriptors: Vec<ExportDescriptor> = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let descriptor = parse_entry(plugin_name, entry)
                .map_err(|reason| HookError::InvalidExport { index, reason })?;
            match descriptors
                .iter_mut()
                .find(|existing| existing.hook_name == descriptor.hook_name)
            {
                Some(existing) => *existing = descriptor,
                None => descriptors.push(descriptor),
            }
        }

        let count = descriptors.len();
        self.exports
            .insert(plugin_name.to_string(), Arc::new(descriptors));

        info!(plugin = %plugin_name, exports = count, "Registered plugin exports");
        Ok(count)
    }

    /// Finds one export.
    pub fn lookup(&self, plugin_name: &str, hook_name: &str) -> Result<ExportDescriptor, HookError> {
        self.exports
            .get(plugin_name)
            .and_then(|set| set.iter().find(|e| e.hook_name == hook_name).cloned())
            .ok_or_else(|| HookError::ExportNotFound {
                plugin: plugin_name.to_string(),
                hook: hook_name.to_string(),
            })
    }

    /// Whether the plugin registered `hook_name`.
    pub fn allowed(&self, plugin_name: &str, hook_name: &str) -> bool {
        self.exports
            .get(plugin_name)
            .is_some_and(|set| set.iter().any(|e| e.hook_name == hook_name))
    }

    /// Exports of one plugin, in registration order.
    pub fn list(&self, plugin_name: &str) -> Vec<ExportDescriptor> {
        self.exports
            .get(plugin_name)
            .map(|set| set.as_ref().clone())
            .unwrap_or_default()
    }

    /// Every plugin's exports, keyed by plugin name.
    pub fn list_all(&self) -> BTreeMap<String, Vec<ExportDescriptor>> {
        self.exports
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().as_ref().clone()))
            .collect()
    }

    /// Clears every plugin's exports.
    pub fn reset_all(&self) {
        self.exports.clear();
        debug!("Export registry reset");
    }
}

/// Whether `name` matches `[A-Za-z0-9_]+`.
pub fn is_valid_hook_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reads `key`, accepting the symbol-prefixed form `:key` as well.
fn field<'a>(entry: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    entry
        .get(key)
        .or_else(|| entry.get(&format!(":{key}")))
}

fn parse_entry(plugin_name: &str, entry: &Value) -> Result<ExportDescriptor, String> {
    let map = entry
        .as_object()
        .ok_or_else(|| "entry must be a map".to_string())?;

    let hook = match field(map, "hook") {
        Some(Value::String(hook)) => hook.strip_prefix(':').unwrap_or(hook),
        Some(_) => return Err("'hook' must be a string".to_string()),
        None => return Err("missing 'hook'".to_string()),
    };
    if !is_valid_hook_name(hook) {
        return Err(format!("hook name '{hook}' must match [A-Za-z0-9_]+"));
    }

    let meta = match field(map, "meta") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(meta)) => meta.clone(),
        Some(_) => return Err("'meta' must be a map".to_string()),
    };

    Ok(ExportDescriptor {
        plugin_name: plugin_name.to_string(),
        hook_name: hook.to_string(),
        meta,
    })
}
