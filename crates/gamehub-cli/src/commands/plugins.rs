//! Plugin management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use gamehub_core::error::AppError;
use gamehub_plugin::{PluginDescriptor, PluginManager, PluginStatus, StartupOutcome};

/// Arguments for plugin commands
#[derive(Debug, Args)]
pub struct PluginsArgs {
    /// Plugin subcommand
    #[command(subcommand)]
    pub command: PluginsCommand,
}

/// Plugin subcommands
#[derive(Debug, Subcommand)]
pub enum PluginsCommand {
    /// Load every plugin and list descriptors
    List,
    /// Reload plugins and run their startup hooks
    Reload,
    /// List buildable plugin sources
    Sources,
    /// Build a plugin source into the plugin directory
    Build {
        /// Source directory name
        name: String,
    },
}

/// Plugin display row for table output
#[derive(Debug, Serialize, Tabled)]
struct PluginRow {
    /// Plugin name
    name: String,
    /// Package id
    package: String,
    /// Hooks module
    hooks_module: String,
    /// Version
    version: String,
    /// Status
    status: String,
}

impl From<&PluginDescriptor> for PluginRow {
    fn from(p: &PluginDescriptor) -> Self {
        Self {
            name: p.name.clone(),
            package: p.package_id.clone(),
            hooks_module: p.hooks_module.clone().unwrap_or_else(|| "-".to_string()),
            version: p.version.clone().unwrap_or_else(|| "-".to_string()),
            status: match &p.status {
                PluginStatus::Ok => "ok".to_string(),
                PluginStatus::Error(reason) => format!("error: {reason}"),
            },
        }
    }
}

/// Startup hook display row
#[derive(Debug, Serialize, Tabled)]
struct StartupRow {
    /// Plugin name
    plugin: String,
    /// Outcome
    outcome: String,
}

/// Build source display row
#[derive(Debug, Serialize, Tabled)]
struct SourceRow {
    /// Source name
    name: String,
    /// Library name
    library: String,
    /// Path
    path: String,
}

/// Execute plugin commands
pub async fn execute(
    args: &PluginsArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let manager = super::plugin_manager(&config);

    match &args.command {
        PluginsCommand::List => {
            manager.registry().reload().await;
            let rows: Vec<PluginRow> = manager
                .list_plugins()
                .await
                .iter()
                .map(PluginRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        PluginsCommand::Reload => {
            let report = manager.reload().await;
            PluginManager::log_report(&report);

            if format == OutputFormat::Json {
                output::print_json(&report);
                return Ok(());
            }

            let rows: Vec<PluginRow> = report.plugins.iter().map(PluginRow::from).collect();
            output::print_list(&rows, format);

            let startup: Vec<StartupRow> = report
                .startup_results
                .iter()
                .map(|(plugin, outcome)| StartupRow {
                    plugin: plugin.clone(),
                    outcome: match outcome {
                        StartupOutcome::Registered { exports } => {
                            format!("registered {exports} export(s)")
                        }
                        StartupOutcome::NoStartupHook => "no startup hook".to_string(),
                        StartupOutcome::Failed { reason } => format!("failed: {reason}"),
                    },
                })
                .collect();
            if !startup.is_empty() {
                output::print_list(&startup, format);
            }

            let failed = report.plugins.iter().filter(|p| !p.status.is_ok()).count();
            if failed > 0 {
                output::print_warning(&format!("{failed} plugin(s) failed to load"));
            } else {
                output::print_success(&format!("{} plugin(s) loaded", report.plugins.len()));
            }
        }
        PluginsCommand::Sources => {
            let rows: Vec<SourceRow> = manager
                .builder()
                .list_sources()
                .await?
                .into_iter()
                .map(|s| SourceRow {
                    name: s.name,
                    library: s.crate_name.unwrap_or_else(|| "-".to_string()),
                    path: s.path.display().to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }
        PluginsCommand::Build { name } => {
            let report = manager.builder().build(name).await?;

            if format == OutputFormat::Json {
                output::print_json(&report);
            } else {
                for step in &report.steps {
                    let status = step
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "none".to_string());
                    println!("$ {}", step.command);
                    output::print_kv("Exit status", &status);
                    if !step.output.trim().is_empty() {
                        println!("{}", step.output.trim_end());
                    }
                }
            }

            if report.success {
                output::print_success(&format!("Plugin '{name}' built"));
            } else {
                return Err(AppError::internal(format!("Build of plugin '{name}' failed")));
            }
        }
    }

    Ok(())
}
