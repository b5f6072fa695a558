//! GameHub Server: extension runtime host
//!
//! Main entry point that wires the plugin runtime, hook dispatcher and
//! scheduled job coordinator together and runs until a shutdown signal.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use gamehub_core::config::{AppConfig, LockStoreKind};
use gamehub_core::error::AppError;
use gamehub_core::traits::schedule_lock::ScheduleLockStore;
use gamehub_database::DatabasePool;
use gamehub_plugin::{
    DynamicLibraryLoader, HostServices, LoaderChain, PluginManager, StaticPackageLoader,
};
use gamehub_worker::{MemoryScheduleLockStore, ScheduledJobCoordinator};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay and variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("GAMEHUB_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("GAMEHUB_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load_with_env(&config_path, Some(&env))
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting GameHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Schedule lock store ──────────────────────────────
    let (db_pool, locks): (Option<DatabasePool>, Arc<dyn ScheduleLockStore>) =
        match config.scheduler.lock_store {
            LockStoreKind::Postgres => {
                tracing::info!("Connecting to database...");
                let pool = DatabasePool::connect_and_migrate(&config.database).await?;
                let store = Arc::new(pool.schedule_locks());
                (Some(pool), store)
            }
            LockStoreKind::Memory => {
                tracing::warn!("Using in-memory schedule locks; run a single instance only");
                (None, Arc::new(MemoryScheduleLockStore::new()))
            }
        };

    // ── Step 2: Plugin runtime ───────────────────────────────────
    let statics = StaticPackageLoader::new().with_package(sample::PACKAGE_ID, || {
        Arc::new(sample::SamplePackage::new())
    });
    let loader = LoaderChain::new()
        .with(Arc::new(statics))
        .with(Arc::new(DynamicLibraryLoader::new()));

    let manager = PluginManager::new(
        &config.plugins,
        &config.hooks,
        Arc::new(loader),
        HostServices::new(None),
    );

    // ── Step 3: Scheduled jobs ───────────────────────────────────
    // Attached before the first reload so startup hooks can schedule jobs.
    let coordinator = if config.scheduler.enabled {
        Some(
            ScheduledJobCoordinator::new(
                Arc::clone(manager.dispatcher()),
                Arc::clone(&locks),
                &config.scheduler,
            )
            .await?,
        )
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    // ── Step 4: Load plugins ─────────────────────────────────────
    if config.plugins.auto_load {
        let report = manager.reload().await;
        PluginManager::log_report(&report);
    } else {
        tracing::info!("Plugin auto-load disabled");
    }

    if let Some(coordinator) = &coordinator {
        coordinator.cleanup_locks().await?;
        coordinator.start().await?;
    }

    tracing::info!("GameHub server running");

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    if let Some(coordinator) = &coordinator {
        coordinator.shutdown().await?;
    }
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("GameHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
