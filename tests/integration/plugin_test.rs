//! End-to-end plugin loading and RPC.

use serde_json::json;

use gamehub_plugin::{CallOptions, HookError, PluginStatus, StartupOutcome};

use crate::helpers::TestRuntime;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sample_plugin_rpc() {
    let rt = TestRuntime::new().await;
    rt.install_sample();

    let report = rt.manager.reload().await;
    assert_eq!(report.plugins.len(), 1);
    assert_eq!(report.plugins[0].status, PluginStatus::Ok);
    assert_eq!(report.plugins[0].hooks_module.as_deref(), Some("SampleHooks"));

    let registry = rt.manager.registry();
    let greeting = registry
        .call_rpc("sample", "greet", vec![json!("world")], CallOptions::new())
        .await;
    assert_eq!(greeting, Ok(json!("hello world")));

    let missing = registry
        .call_rpc("sample", "missing", vec![], CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(missing, HookError::FunctionNotFound { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_hook_registers_exports_and_jobs() {
    let rt = TestRuntime::new().await;
    rt.install_sample();

    let report = rt.manager.reload().await;
    assert_eq!(
        report.startup_results.get("sample"),
        Some(&StartupOutcome::Registered { exports: 1 })
    );

    let exports = rt.manager.exports();
    assert!(exports.allowed("sample", "leaderboard_top"));
    assert_eq!(
        exports.lookup("sample", "leaderboard_top").unwrap().meta["cached"],
        json!(false)
    );

    let top = rt
        .manager
        .registry()
        .call_rpc("sample", "leaderboard_top", vec![json!(2)], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(top, json!([{"rank": 1}, {"rank": 2}]));

    assert_eq!(
        rt.coordinator.registered_callbacks().await,
        vec![sample::hooks::DAILY_REWARDS.to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_plugin_does_not_block_others() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.install("broken", "hooks_module = [not toml");
    rt.install(
        "unknown",
        "package = \"does_not_exist\"\nhooks_module = \"Nope\"\n",
    );

    let report = rt.manager.reload().await;
    assert_eq!(report.plugins.len(), 3);

    let status = |name: &str| {
        report
            .plugins
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.status.clone())
            .unwrap()
    };
    assert!(status("sample").is_ok());
    assert!(!status("broken").is_ok());
    assert!(!status("unknown").is_ok());

    let err = rt
        .manager
        .registry()
        .call_rpc("broken", "greet", vec![json!("x")], CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HookError::PluginNotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reload_replaces_previous_state() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.manager.reload().await;
    assert_eq!(rt.manager.list_plugins().await.len(), 1);

    std::fs::remove_dir_all(rt.dir.path().join("sample")).unwrap();
    let report = rt.manager.reload().await;
    assert!(report.plugins.is_empty());
    assert!(rt.manager.exports().list_all().is_empty());
    assert!(rt.manager.dispatcher().module().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rpc_refuses_scheduled_callback() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.manager.reload().await;

    let registry = rt.manager.registry();
    for args in [vec![json!({})], vec![]] {
        assert_eq!(
            registry
                .call_rpc("sample", sample::hooks::DAILY_REWARDS, args, CallOptions::new())
                .await,
            Err(HookError::NotAllowed(sample::hooks::DAILY_REWARDS.to_string()))
        );
    }

    // Cancelling the only job using the callback lifts the protection.
    let jobs = rt.coordinator.list().await;
    rt.coordinator.cancel(&jobs[0].name).await.unwrap();
    assert!(
        registry
            .call_rpc("sample", sample::hooks::DAILY_REWARDS, vec![json!({})], CallOptions::new())
            .await
            .is_ok()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registry_reload_drops_exports() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.manager.reload().await;
    assert!(rt.manager.exports().allowed("sample", "leaderboard_top"));

    rt.manager.registry().reload().await;
    assert!(rt.manager.exports().list_all().is_empty());
    assert!(matches!(
        rt.manager
            .registry()
            .call_rpc("sample", "leaderboard_top", vec![json!(2)], CallOptions::new())
            .await,
        Err(HookError::FunctionNotFound { .. })
    ));
}
