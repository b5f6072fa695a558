//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod hooks;
pub mod logging;
pub mod plugin;
pub mod scheduler;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::hooks::HookConfig;
pub use self::logging::LoggingConfig;
pub use self::plugin::PluginConfig;
pub use self::scheduler::{LockStoreKind, SchedulerConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Plugin discovery and build settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Hook dispatch settings.
    #[serde(default)]
    pub hooks: HookConfig,
    /// Scheduled job settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables prefixed with `GAMEHUB__` override file values,
    /// e.g. `GAMEHUB__HOOKS__TIMEOUT_MS=2000`.
    pub fn load(path: &str) -> Result<Self, AppError> {
        Self::load_with_env(path, None)
    }

    /// Load configuration from a TOML file plus an environment overlay.
    ///
    /// The overlay lives next to the base file as `{env}.toml`. Missing files
    /// are tolerated so a bare environment-variable configuration also works.
    pub fn load_with_env(path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let mut builder =
            config::Config::builder().add_source(config::File::with_name(path).required(false));

        if let Some(env) = env {
            let overlay = std::path::Path::new(path)
                .parent()
                .map(|dir| dir.join(env))
                .unwrap_or_else(|| std::path::PathBuf::from(env));
            builder = builder.add_source(
                config::File::with_name(&overlay.to_string_lossy()).required(false),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("GAMEHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("hooks.allow_list")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
