//! Hook dispatcher: the single chokepoint between domain code and the
//! configured extension module.
//!
//! Three entry points:
//! - [`internal_call`](HookDispatcher::internal_call) for lifecycle callbacks,
//!   falling back to the callback's safe default when unimplemented.
//! - [`call`](HookDispatcher::call) for externally requested functions, gated
//!   by the [`CallPolicy`].
//! - [`invoke`](HookDispatcher::invoke) for scheduled callbacks, which bypass
//!   the policy and never propagate failures to the scheduler.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use gamehub_core::error::AppError;

use crate::api::context::{CallContext, CallOptions, HostServices};
use crate::error::HookError;
use crate::executor::{CallExecutor, CallSlot, Invocation};
use crate::module::{ExportedFunction, HookModule, group_exports};

use super::definitions::LifecycleHook;
use super::policy::CallPolicy;

/// Dispatches calls to the configured extension module.
#[derive(Debug)]
pub struct HookDispatcher {
    module: RwLock<Option<Arc<dyn HookModule>>>,
    policy: Arc<CallPolicy>,
    executor: CallExecutor,
    services: HostServices,
}

impl HookDispatcher {
    /// Creates a dispatcher with no module configured.
    ///
    /// The policy may be shared with the plugin registry so protected
    /// callbacks are refused on every external call path.
    pub fn new(
        executor: CallExecutor,
        policy: impl Into<Arc<CallPolicy>>,
        services: HostServices,
    ) -> Self {
        Self {
            module: RwLock::new(None),
            policy: policy.into(),
            executor,
            services,
        }
    }

    /// Swaps the configured module. `None` disables extension calls.
    pub async fn configure(&self, module: Option<Arc<dyn HookModule>>) {
        match &module {
            Some(m) => info!(module = %m.name(), "Extension module configured"),
            None => info!("Extension module cleared"),
        }
        *self.module.write().await = module;
    }

    /// The configured module, if any.
    pub async fn module(&self) -> Option<Arc<dyn HookModule>> {
        self.module.read().await.clone()
    }

    /// The call policy (allow-list and protected callbacks).
    pub fn policy(&self) -> &Arc<CallPolicy> {
        &self.policy
    }

    /// Host services handed to callees.
    pub fn services(&self) -> &HostServices {
        &self.services
    }

    /// Fires a lifecycle callback.
    ///
    /// Returns the callback's safe default when no module is configured or
    /// the module does not export it; `before_*` callbacks then approve their
    /// first argument unchanged.
    pub async fn internal_call(
        &self,
        hook: LifecycleHook,
        args: Vec<Value>,
        opts: CallOptions,
    ) -> Result<Value, HookError> {
        if args.len() != hook.arity() {
            return Err(HookError::ArityMismatch {
                name: hook.as_str().to_string(),
                expected: vec![hook.arity()],
                given: args.len(),
            });
        }

        let Some(module) = self.module().await else {
            trace!(hook = %hook, "No extension module, using safe default");
            return Ok(hook.default_result(&args));
        };
        if !module.exports_function(hook.as_str(), hook.arity()) {
            trace!(hook = %hook, module = %module.name(), "Callback not implemented, using safe default");
            return Ok(hook.default_result(&args));
        }

        debug!(hook = %hook, module = %module.name(), "Dispatching lifecycle callback");
        let ctx = CallContext::new(opts.caller, self.services.clone());
        self.executor
            .run(
                Invocation::function(module, hook.as_str(), args, ctx),
                opts.timeout,
            )
            .await
    }

    /// Fires a `before_*` callback on a request path.
    ///
    /// Timeouts and callee failures become a deterministic
    /// [`ErrorKind::Rejected`](gamehub_core::error::ErrorKind::Rejected).
    pub async fn internal_call_or_reject(
        &self,
        hook: LifecycleHook,
        args: Vec<Value>,
        opts: CallOptions,
    ) -> Result<Value, AppError> {
        match self.internal_call(hook, args, opts).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_callee_failure() => {
                info!(hook = %hook, error = %e, "Operation declined by extension");
                Err(AppError::rejected(format!(
                    "Operation declined by extension: {}",
                    hook
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fires an observing callback in the background, logging failures.
    pub fn fire_and_forget(self: &Arc<Self>, hook: LifecycleHook, args: Vec<Value>, opts: CallOptions) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.internal_call(hook, args, opts).await {
                warn!(hook = %hook, error = %e, "Background lifecycle callback failed");
            }
        });
    }

    /// Calls an exported function on behalf of an outside caller.
    pub async fn call(
        &self,
        name: &str,
        args: Vec<Value>,
        opts: CallOptions,
    ) -> Result<Value, HookError> {
        let module = self.module().await.ok_or(HookError::NotConfigured)?;

        // Protection applies to the name at every arity.
        if let Err(e) = self.policy.check(name) {
            debug!(hook = %name, "Call rejected by policy");
            return Err(e);
        }

        let arity = args.len();
        if !module.exports_function(name, arity) {
            let expected = module.arities(name);
            return Err(if expected.is_empty() {
                HookError::FunctionNotFound {
                    name: name.to_string(),
                    arity,
                }
            } else {
                HookError::ArityMismatch {
                    name: name.to_string(),
                    expected,
                    given: arity,
                }
            });
        }

        let ctx = CallContext::new(opts.caller, self.services.clone());
        self.executor
            .run(Invocation::function(module, name, args, ctx), opts.timeout)
            .await
    }

    /// Runs a scheduled callback with its trigger context.
    ///
    /// Resolution order: `name/1` with the context, `name/0`, then the
    /// module's custom-hook entry point. Failures are logged and returned
    /// but never panic.
    pub async fn invoke(&self, name: &str, context: Value) -> Result<(), HookError> {
        let slot = match self.reserve_slot(name).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(hook = %name, error = %e, "Scheduled callback failed");
                return Err(e);
            }
        };
        self.invoke_in_slot(slot, name, context).await
    }

    /// Reserves an executor slot for a scheduled callback, waiting up to the
    /// default call timeout for one to free up.
    pub async fn reserve_slot(&self, name: &str) -> Result<CallSlot, HookError> {
        self.executor
            .reserve(name, self.executor.default_timeout())
            .await
    }

    /// [`invoke`](Self::invoke) in a slot reserved by
    /// [`reserve_slot`](Self::reserve_slot).
    pub async fn invoke_in_slot(
        &self,
        slot: CallSlot,
        name: &str,
        context: Value,
    ) -> Result<(), HookError> {
        let Some(module) = self.module().await else {
            warn!(hook = %name, "Scheduled callback fired with no extension module configured");
            return Err(HookError::NotConfigured);
        };

        let ctx = CallContext::new(None, self.services.clone());
        let invocation = if module.exports_function(name, 1) {
            Invocation::function(module, name, vec![context], ctx)
        } else if module.exports_function(name, 0) {
            Invocation::function(module, name, Vec::new(), ctx)
        } else {
            Invocation::custom_hook(module, name, vec![context], ctx)
        };

        match self.executor.run_in_slot(slot, invocation, None).await {
            Ok(_) => {
                debug!(hook = %name, "Scheduled callback completed");
                Ok(())
            }
            Err(e) => {
                error!(hook = %name, error = %e, "Scheduled callback failed");
                Err(e)
            }
        }
    }

    /// Functions the configured module exports, grouped by name.
    pub async fn exported_functions(&self) -> Vec<ExportedFunction> {
        match self.module().await {
            Some(module) => group_exports(module.exports()),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use gamehub_core::error::ErrorKind;
    use serde_json::json;

    use crate::traits::FunctionModule;

    fn dispatcher(policy: CallPolicy) -> HookDispatcher {
        HookDispatcher::new(
            CallExecutor::new(8, Duration::from_millis(200)),
            policy,
            HostServices::default(),
        )
    }

    fn module(invocations: Arc<AtomicUsize>) -> Arc<dyn HookModule> {
        FunctionModule::builder("GameHooks")
            .function("before_lobby_create", 1, |args, _ctx| async move {
                let mut attrs = args[0].clone();
                attrs["name"] = json!("renamed");
                Ok(attrs)
            })
            .function("before_chat_message", 1, |_args, _ctx| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Value::Null)
            })
            .function("greet", 1, |args, ctx| async move {
                Ok(json!({
                    "greeting": format!("hello {}", args[0].as_str().unwrap_or_default()),
                    "caller": ctx.caller_id(),
                }))
            })
            .function("report_job", 0, |_args, _ctx| async { Ok(json!("ok")) })
            .function("tick", 1, move |args, _ctx| {
                let invocations = invocations.clone();
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(args[0]["job_name"].clone())
                }
            })
            .custom_hooks(|name, _args, _ctx| async move {
                if name == "dynamic_job" {
                    Ok(Value::Null)
                } else {
                    Err(format!("unknown hook {name}"))
                }
            })
            .into_module()
    }

    #[tokio::test]
    async fn test_internal_call_defaults_without_module() {
        let dispatcher = dispatcher(CallPolicy::default());
        let input = json!({"name": "arena"});

        let result = dispatcher
            .internal_call(LifecycleHook::BeforeLobbyCreate, vec![input.clone()], CallOptions::new())
            .await;
        assert_eq!(result, Ok(input));

        let result = dispatcher
            .internal_call(LifecycleHook::AfterLobbyCreate, vec![json!({})], CallOptions::new())
            .await;
        assert_eq!(result, Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_internal_call_transforms_when_implemented() {
        let dispatcher = dispatcher(CallPolicy::default());
        dispatcher
            .configure(Some(module(Arc::new(AtomicUsize::new(0)))))
            .await;

        let result = dispatcher
            .internal_call(
                LifecycleHook::BeforeLobbyCreate,
                vec![json!({"name": "arena"})],
                CallOptions::new(),
            )
            .await;
        assert_eq!(result, Ok(json!({"name": "renamed"})));

        let input = json!({"score": 10});
        let result = dispatcher
            .internal_call(
                LifecycleHook::BeforeLeaderboardSubmit,
                vec![input.clone()],
                CallOptions::new(),
            )
            .await;
        assert_eq!(result, Ok(input));
    }

    #[tokio::test]
    async fn test_internal_call_checks_arity() {
        let dispatcher = dispatcher(CallPolicy::default());
        let result = dispatcher
            .internal_call(LifecycleHook::BeforeLobbyJoin, vec![json!({})], CallOptions::new())
            .await;
        assert!(matches!(result, Err(HookError::ArityMismatch { given: 1, .. })));
    }

    #[tokio::test]
    async fn test_timeout_rejects_request() {
        let dispatcher = dispatcher(CallPolicy::default());
        dispatcher
            .configure(Some(module(Arc::new(AtomicUsize::new(0)))))
            .await;

        let started = Instant::now();
        let result = dispatcher
            .internal_call(
                LifecycleHook::BeforeChatMessage,
                vec![json!("hi")],
                CallOptions::new().with_timeout(Duration::from_millis(50)),
            )
            .await;
        assert!(matches!(result, Err(HookError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));

        let rejected = dispatcher
            .internal_call_or_reject(
                LifecycleHook::BeforeChatMessage,
                vec![json!("hi")],
                CallOptions::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(rejected.kind, ErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_call_resolution_errors() {
        let dispatcher = dispatcher(CallPolicy::default());
        assert_eq!(
            dispatcher.call("greet", vec![json!("x")], CallOptions::new()).await,
            Err(HookError::NotConfigured)
        );

        dispatcher
            .configure(Some(module(Arc::new(AtomicUsize::new(0)))))
            .await;
        assert_eq!(
            dispatcher.call("missing", vec![], CallOptions::new()).await,
            Err(HookError::FunctionNotFound {
                name: "missing".to_string(),
                arity: 0
            })
        );
        assert_eq!(
            dispatcher.call("greet", vec![], CallOptions::new()).await,
            Err(HookError::ArityMismatch {
                name: "greet".to_string(),
                expected: vec![1],
                given: 0
            })
        );
    }

    #[tokio::test]
    async fn test_call_passes_caller() {
        let dispatcher = dispatcher(CallPolicy::default());
        dispatcher
            .configure(Some(module(Arc::new(AtomicUsize::new(0)))))
            .await;

        let result = dispatcher
            .call(
                "greet",
                vec![json!("world")],
                CallOptions::new().with_caller(42),
            )
            .await;
        assert_eq!(
            result,
            Ok(json!({"greeting": "hello world", "caller": 42}))
        );
    }

    #[tokio::test]
    async fn test_protected_and_allow_list() {
        let dispatcher = dispatcher(CallPolicy::new(Some(vec![
            "greet".to_string(),
            "report_job".to_string(),
        ])));
        dispatcher
            .configure(Some(module(Arc::new(AtomicUsize::new(0)))))
            .await;

        assert!(dispatcher.call("report_job", vec![], CallOptions::new()).await.is_ok());

        dispatcher.policy().protect("report_job");
        assert_eq!(
            dispatcher.call("report_job", vec![], CallOptions::new()).await,
            Err(HookError::NotAllowed("report_job".to_string()))
        );

        assert_eq!(
            dispatcher
                .call("tick", vec![json!({})], CallOptions::new())
                .await,
            Err(HookError::NotAllowed("tick".to_string()))
        );
    }

    #[tokio::test]
    async fn test_protected_name_refused_at_any_arity() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(CallPolicy::default());
        dispatcher.configure(Some(module(invocations.clone()))).await;
        dispatcher.policy().protect("tick");

        for args in [vec![], vec![json!({})], vec![json!(1), json!(2)]] {
            assert_eq!(
                dispatcher.call("tick", args, CallOptions::new()).await,
                Err(HookError::NotAllowed("tick".to_string()))
            );
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 0);

        // Unprotected names keep their arity diagnostics.
        assert!(matches!(
            dispatcher.call("greet", vec![], CallOptions::new()).await,
            Err(HookError::ArityMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_resolution() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(CallPolicy::default());
        assert_eq!(
            dispatcher.invoke("tick", json!({})).await,
            Err(HookError::NotConfigured)
        );

        dispatcher.configure(Some(module(invocations.clone()))).await;
        dispatcher.policy().protect("tick");

        assert!(dispatcher.invoke("tick", json!({"job_name": "tick"})).await.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        assert!(dispatcher.invoke("report_job", json!({})).await.is_ok());
        assert!(dispatcher.invoke("dynamic_job", json!({})).await.is_ok());
        assert!(matches!(
            dispatcher.invoke("unknown_job", json!({})).await,
            Err(HookError::Exception { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_waits_for_reserved_slot() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let dispatcher = HookDispatcher::new(
            CallExecutor::new(1, Duration::from_millis(500)),
            CallPolicy::default(),
            HostServices::default(),
        );
        dispatcher.configure(Some(module(invocations.clone()))).await;

        let held = dispatcher.reserve_slot("greet").await.unwrap();
        assert_eq!(
            dispatcher.call("greet", vec![json!("x")], CallOptions::new()).await,
            Err(HookError::Overloaded("greet".to_string()))
        );

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        });
        assert!(dispatcher.invoke("tick", json!({"job_name": "tick"})).await.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn test_exported_functions() {
        let dispatcher = dispatcher(CallPolicy::default());
        assert!(dispatcher.exported_functions().await.is_empty());

        dispatcher
            .configure(Some(module(Arc::new(AtomicUsize::new(0)))))
            .await;
        let functions = dispatcher.exported_functions().await;
        let greet = functions.iter().find(|f| f.name == "greet").unwrap();
        assert_eq!(greet.arities, vec![1]);
        assert_eq!(functions.len(), 5);
    }
}
