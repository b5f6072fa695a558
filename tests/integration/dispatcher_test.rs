//! Hook dispatch against the configured extension module.

use std::time::Duration;

use serde_json::json;

use gamehub_core::error::ErrorKind;
use gamehub_plugin::{CallOptions, HookError, LifecycleHook};

use crate::helpers::TestRuntime;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lifecycle_defaults_without_plugins() {
    let rt = TestRuntime::new().await;
    rt.manager.reload().await;

    let dispatcher = rt.manager.dispatcher();
    let lobby = json!({"name": "  squad  "});
    let result = dispatcher
        .internal_call(
            LifecycleHook::BeforeLobbyCreate,
            vec![lobby.clone()],
            CallOptions::new(),
        )
        .await;
    assert_eq!(result, Ok(lobby));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lifecycle_callback_transforms_input() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.manager.reload().await;

    let dispatcher = rt.manager.dispatcher();
    let result = dispatcher
        .internal_call(
            LifecycleHook::BeforeLobbyCreate,
            vec![json!({"name": "  squad  "})],
            CallOptions::new(),
        )
        .await;
    assert_eq!(result, Ok(json!({"name": "squad"})));

    let rejected = dispatcher
        .internal_call_or_reject(
            LifecycleHook::BeforeLobbyCreate,
            vec![json!({"name": "   "})],
            CallOptions::new().with_timeout(Duration::from_millis(500)),
        )
        .await
        .unwrap_err();
    assert_eq!(rejected.kind, ErrorKind::Rejected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_reports_missing_and_wrong_arity() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.manager.reload().await;

    let dispatcher = rt.manager.dispatcher();
    assert_eq!(
        dispatcher
            .call("greet", vec![json!("hub")], CallOptions::new().with_caller(42))
            .await,
        Ok(json!("hello hub"))
    );
    assert!(matches!(
        dispatcher.call("greet", vec![], CallOptions::new()).await,
        Err(HookError::ArityMismatch { .. })
    ));
    assert!(matches!(
        dispatcher.call("nope", vec![], CallOptions::new()).await,
        Err(HookError::FunctionNotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduled_callback_is_not_callable() {
    let rt = TestRuntime::new().await;
    rt.install_sample();
    rt.manager.reload().await;

    let err = rt
        .manager
        .dispatcher()
        .call(
            sample::hooks::DAILY_REWARDS,
            vec![json!({})],
            CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HookError::NotAllowed(_)));

    // The callback exports only arity 1; other arities are refused the same way.
    for args in [vec![], vec![json!({}), json!({})]] {
        assert_eq!(
            rt.manager
                .dispatcher()
                .call(sample::hooks::DAILY_REWARDS, args, CallOptions::new())
                .await,
            Err(HookError::NotAllowed(sample::hooks::DAILY_REWARDS.to_string()))
        );
    }
}
