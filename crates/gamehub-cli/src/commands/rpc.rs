//! Plugin RPC command.

use std::time::Duration;

use clap::Args;
use serde_json::Value;

use crate::output;
use gamehub_core::error::AppError;
use gamehub_plugin::CallOptions;

/// Arguments for the rpc command
#[derive(Debug, Args)]
pub struct RpcArgs {
    /// Plugin name
    pub plugin: String,
    /// Function or export name
    pub function: String,
    /// Arguments as a JSON array
    #[arg(default_value = "[]")]
    pub args: String,
    /// Caller user id
    #[arg(long)]
    pub caller: Option<i64>,
    /// Timeout in milliseconds, overriding the configured default
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Execute the rpc command
pub async fn execute(args: &RpcArgs, config_path: &str) -> Result<(), AppError> {
    let call_args = parse_args(&args.args)?;

    let config = super::load_config(config_path)?;
    let manager = super::plugin_manager(&config);
    manager.reload().await;

    let mut opts = CallOptions::new();
    if let Some(caller) = args.caller {
        opts = opts.with_caller(caller);
    }
    if let Some(ms) = args.timeout_ms {
        opts = opts.with_timeout(Duration::from_millis(ms));
    }

    let result = manager
        .registry()
        .call_rpc(&args.plugin, &args.function, call_args, opts)
        .await?;

    output::print_json(&result);
    Ok(())
}

fn parse_args(raw: &str) -> Result<Vec<Value>, AppError> {
    match serde_json::from_str::<Value>(raw)
        .map_err(|e| AppError::validation(format!("Invalid JSON arguments: {e}")))?
    {
        Value::Array(items) => Ok(items),
        other => Ok(vec![other]),
    }
}
