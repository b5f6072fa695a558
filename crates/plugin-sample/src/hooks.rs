//! The `SampleHooks` module.

use std::sync::Arc;

use gamehub_plugin_sdk::prelude::*;
use gamehub_plugin_sdk::{export_list, string_arg};

/// Module name referenced by `hooks_module` in the manifest.
pub const MODULE_NAME: &str = "SampleHooks";

/// Scheduled callback registered at startup.
pub const DAILY_REWARDS: &str = "daily_rewards";

/// Builds the `SampleHooks` module.
pub fn sample_hooks() -> Arc<dyn HookModule> {
    FunctionModule::builder(MODULE_NAME)
        .function("greet", 1, |args, _ctx| async move {
            let name = string_arg(&args, 0)?;
            Ok(json!(format!("hello {name}")))
        })
        .function(
            LifecycleHook::BeforeLobbyCreate.as_str(),
            1,
            |args, _ctx| async move { normalize_lobby(args.into_iter().next().unwrap_or_default()) },
        )
        .function(STARTUP_FUNCTION, 0, |_args, ctx| async move {
            if let Some(scheduler) = ctx.scheduler() {
                scheduler
                    .schedule(ScheduleRequest::daily(
                        DAILY_REWARDS,
                        DailyOptions { hour: 0, minute: 5 },
                    ))
                    .await?;
            }
            Ok(export_list!["leaderboard_top" => { "cached": false }])
        })
        .function(DAILY_REWARDS, 1, |args, _ctx| async move {
            let job = args[0]["job_name"].as_str().unwrap_or(DAILY_REWARDS).to_string();
            tracing::info!(job = %job, "Granting daily rewards");
            Ok(Value::Null)
        })
        .custom_hooks(|name, args, _ctx| async move {
            match name.as_str() {
                "leaderboard_top" => {
                    let limit = args.first().and_then(Value::as_u64).unwrap_or(3).min(10);
                    Ok(json!((1..=limit).map(|rank| json!({"rank": rank})).collect::<Vec<_>>()))
                }
                other => Err(format!("SampleHooks has no custom hook '{other}'")),
            }
        })
        .into_module()
}

fn normalize_lobby(mut lobby: Value) -> CalleeResult {
    let name = lobby["name"].as_str().unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err("lobby name must not be empty".to_string());
    }
    lobby["name"] = json!(name);
    Ok(lobby)
}
