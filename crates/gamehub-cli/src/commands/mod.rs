//! CLI command definitions and dispatch.

pub mod exports;
pub mod locks;
pub mod migrate;
pub mod plugins;
pub mod rpc;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use gamehub_core::config::AppConfig;
use gamehub_core::error::AppError;
use gamehub_database::DatabasePool;
use gamehub_plugin::api::context::HostServices;
use gamehub_plugin::{DynamicLibraryLoader, LoaderChain, PluginManager, StaticPackageLoader};

/// GameHub: extension runtime administration
#[derive(Debug, Parser)]
#[command(name = "gamehub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Plugin discovery, reload and build
    Plugins(plugins::PluginsArgs),
    /// Call a plugin function
    Rpc(rpc::RpcArgs),
    /// Show exports registered by plugin startup hooks
    Exports,
    /// Schedule lock maintenance
    Locks(locks::LocksArgs),
    /// Apply database migrations
    Migrate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Plugins(args) => plugins::execute(args, &self.config, self.format).await,
            Commands::Rpc(args) => rpc::execute(args, &self.config).await,
            Commands::Exports => exports::execute(&self.config, self.format).await,
            Commands::Locks(args) => locks::execute(args, &self.config, self.format).await,
            Commands::Migrate => migrate::execute(&self.config).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    let env = std::env::var("GAMEHUB_ENV").ok();
    AppConfig::load_with_env(config_path, env.as_deref())
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: build a plugin manager over the compiled-in and shared-library
/// package loaders. Nothing is loaded until the caller reloads.
pub fn plugin_manager(config: &AppConfig) -> PluginManager {
    let statics = StaticPackageLoader::new().with_package(sample::PACKAGE_ID, || {
        Arc::new(sample::SamplePackage::new())
    });
    let loader = LoaderChain::new()
        .with(Arc::new(statics))
        .with(Arc::new(DynamicLibraryLoader::new()));

    PluginManager::new(
        &config.plugins,
        &config.hooks,
        Arc::new(loader),
        HostServices::new(None),
    )
}
