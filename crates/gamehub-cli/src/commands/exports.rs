//! Export listing command.

use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use gamehub_core::error::AppError;

/// Export display row
#[derive(Debug, Serialize, Tabled)]
struct ExportRow {
    /// Plugin name
    plugin: String,
    /// Hook name
    hook: String,
    /// Metadata
    meta: String,
}

/// Reload plugins and print every registered export
pub async fn execute(config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let manager = super::plugin_manager(&config);
    manager.reload().await;

    let rows: Vec<ExportRow> = manager
        .exports()
        .list_all()
        .into_values()
        .flatten()
        .map(|e| ExportRow {
            plugin: e.plugin_name,
            hook: e.hook_name,
            meta: serde_json::Value::Object(e.meta).to_string(),
        })
        .collect();

    output::print_list(&rows, format);
    Ok(())
}
