//! Plugin builder: compiles plugin sources into the plugin root layout.
//!
//! A buildable source is a directory under the sources root that holds both
//! a `Cargo.toml` and the plugin manifest. Building runs a fixed sequence of
//! shell steps and stops at the first one that fails.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use gamehub_core::config::PluginConfig;
use gamehub_core::error::AppError;
use gamehub_core::result::AppResult;

/// A plugin source directory that can be built.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSource {
    /// Directory name, also the installed plugin name.
    pub name: String,
    /// Source directory.
    pub path: PathBuf,
    /// Library name from `Cargo.toml` (`[lib]`, else `[package]`).
    pub crate_name: Option<String>,
}

/// One executed build step.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStep {
    /// The command line that ran.
    pub command: String,
    /// Exit status; `None` when the process could not be spawned or was
    /// killed by a signal.
    pub status: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl BuildStep {
    /// Whether the step exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

/// Result of building one plugin.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Plugin name.
    pub plugin: String,
    /// Steps in execution order.
    pub steps: Vec<BuildStep>,
    /// Whether every step succeeded.
    pub success: bool,
}

/// Builds plugin sources into the plugin root.
#[derive(Debug, Clone)]
pub struct PluginBuilder {
    sources_dir: PathBuf,
    plugins_dir: PathBuf,
    program: String,
    code_dir: String,
    manifest_file: String,
}

impl PluginBuilder {
    /// Creates a builder from the `[plugins]` configuration section.
    pub fn new(config: &PluginConfig) -> Self {
        Self {
            sources_dir: PathBuf::from(&config.sources_directory),
            plugins_dir: PathBuf::from(&config.directory),
            program: config.build_program.clone(),
            code_dir: config.code_dir.clone(),
            manifest_file: config.manifest_file.clone(),
        }
    }

    /// Lists buildable sources, sorted by name.
    pub async fn list_sources(&self) -> AppResult<Vec<BuildSource>> {
        let mut entries = match tokio::fs::read_dir(&self.sources_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::with_source(
                    gamehub_core::error::ErrorKind::Storage,
                    format!("Cannot read plugin sources '{}'", self.sources_dir.display()),
                    e,
                ));
            }
        };

        let mut sources = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.join("Cargo.toml").is_file() || !path.join(&self.manifest_file).is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            sources.push(BuildSource {
                name,
                crate_name: crate_name(&path.join("Cargo.toml")).await,
                path,
            });
        }
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    /// Builds one source and installs it as `<plugins>/<name>/<code_dir>`.
    pub async fn build(&self, name: &str) -> AppResult<BuildReport> {
        let source = self
            .list_sources()
            .await?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| AppError::not_found(format!("Plugin source '{name}' not found")))?;

        let crate_name = source.crate_name.clone().unwrap_or_else(|| name.to_string());
        let artifact = format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            crate_name.replace('-', "_"),
            std::env::consts::DLL_SUFFIX
        );
        let target_dir = source.path.join("target");
        let install_dir = self.plugins_dir.join(name).join(&self.code_dir);

        let plan: Vec<(String, Vec<String>)> = vec![
            (
                self.program.clone(),
                vec![
                    "build".to_string(),
                    "--release".to_string(),
                    "--manifest-path".to_string(),
                    path_arg(&source.path.join("Cargo.toml")),
                    "--target-dir".to_string(),
                    path_arg(&target_dir),
                ],
            ),
            (
                "mkdir".to_string(),
                vec!["-p".to_string(), path_arg(&install_dir)],
            ),
            (
                "cp".to_string(),
                vec![
                    path_arg(&source.path.join(&self.manifest_file)),
                    path_arg(&install_dir.join(&self.manifest_file)),
                ],
            ),
            (
                "cp".to_string(),
                vec![
                    path_arg(&target_dir.join("release").join(&artifact)),
                    path_arg(&install_dir),
                ],
            ),
        ];

        let mut steps = Vec::with_capacity(plan.len());
        let mut success = true;
        for (program, args) in plan {
            let step = run_step(&program, &args).await;
            let ok = step.succeeded();
            steps.push(step);
            if !ok {
                success = false;
                break;
            }
        }

        if success {
            info!(plugin = %name, install_dir = %install_dir.display(), "Plugin built");
        } else {
            warn!(plugin = %name, steps = steps.len(), "Plugin build failed");
        }

        Ok(BuildReport {
            plugin: name.to_string(),
            steps,
            success,
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn crate_name(manifest: &Path) -> Option<String> {
    let contents = tokio::fs::read_to_string(manifest).await.ok()?;
    let value: toml::Value = toml::from_str(&contents).ok()?;
    ["lib", "package"]
        .iter()
        .find_map(|table| value.get(table)?.get("name")?.as_str())
        .map(str::to_string)
}

async fn run_step(program: &str, args: &[String]) -> BuildStep {
    let command = std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            BuildStep {
                command,
                status: output.status.code(),
                output: text,
            }
        }
        Err(e) => BuildStep {
            command,
            status: None,
            output: format!("failed to spawn: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path, program: &str) -> PluginConfig {
        PluginConfig {
            directory: root.join("plugins").to_string_lossy().into_owned(),
            sources_directory: root.join("sources").to_string_lossy().into_owned(),
            build_program: program.to_string(),
            ..PluginConfig::default()
        }
    }

    fn write_source(root: &Path, name: &str, with_manifest: bool) {
        let dir = root.join("sources").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Cargo.toml"),
            format!("[package]\nname = \"{name}-plugin\"\nversion = \"0.1.0\"\n"),
        )
        .unwrap();
        if with_manifest {
            std::fs::write(dir.join("plugin.toml"), "hooks_module = \"Hooks\"").unwrap();
        }
    }

    #[tokio::test]
    async fn test_list_sources() {
        let root = tempfile::tempdir().unwrap();
        write_source(root.path(), "sample", true);
        write_source(root.path(), "half", false);

        let builder = PluginBuilder::new(&config(root.path(), "cargo"));
        let sources = builder.list_sources().await.unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "sample");
        assert_eq!(sources[0].crate_name.as_deref(), Some("sample-plugin"));
    }

    #[tokio::test]
    async fn test_missing_sources_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let builder = PluginBuilder::new(&config(root.path(), "cargo"));
        assert!(builder.list_sources().await.unwrap().is_empty());
        assert!(builder.build("sample").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_stops_at_first_failure() {
        let root = tempfile::tempdir().unwrap();
        write_source(root.path(), "sample", true);

        let builder = PluginBuilder::new(&config(root.path(), "false"));
        let report = builder.build("sample").await.unwrap();

        assert!(!report.success);
        assert_eq!(report.steps.len(), 1);
        assert!(report.steps[0].command.starts_with("false build --release"));
        assert_eq!(report.steps[0].status, Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_reports_missing_artifact() {
        let root = tempfile::tempdir().unwrap();
        write_source(root.path(), "sample", true);

        let builder = PluginBuilder::new(&config(root.path(), "true"));
        let report = builder.build("sample").await.unwrap();

        assert!(!report.success);
        assert_eq!(report.steps.len(), 4);
        assert!(report.steps[..3].iter().all(BuildStep::succeeded));
        assert!(report.steps[3].command.contains("sample_plugin"));
        assert!(
            root.path()
                .join("plugins/sample/lib/plugin.toml")
                .is_file()
        );
    }
}
