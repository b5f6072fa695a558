//! Closure-based hooks modules for quick module creation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::api::context::CallContext;
use crate::module::{CalleeResult, FunctionExport, HookModule};

type BoxedFunction =
    Arc<dyn Fn(Vec<Value>, CallContext) -> BoxFuture<'static, CalleeResult> + Send + Sync>;

type BoxedCustomHook = Arc<
    dyn Fn(String, Vec<Value>, CallContext) -> BoxFuture<'static, CalleeResult> + Send + Sync,
>;

/// A hooks module backed by a table of closures keyed by `name/arity`.
///
/// ```rust,ignore
/// let module = FunctionModule::builder("SampleHooks")
///     .function("greet", 1, |args, _ctx| async move {
///         Ok(json!(format!("hello {}", args[0].as_str().unwrap_or_default())))
///     })
///     .build();
/// ```
pub struct FunctionModule {
    name: String,
    functions: HashMap<(String, usize), BoxedFunction>,
    custom_hook: Option<BoxedCustomHook>,
}

impl std::fmt::Debug for FunctionModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionModule")
            .field("name", &self.name)
            .field("exports", &self.exports())
            .field("custom_hook", &self.custom_hook.is_some())
            .finish()
    }
}

impl FunctionModule {
    /// Starts building a module with the given name.
    pub fn builder(name: impl Into<String>) -> FunctionModuleBuilder {
        FunctionModuleBuilder {
            module: FunctionModule {
                name: name.into(),
                functions: HashMap::new(),
                custom_hook: None,
            },
        }
    }
}

#[async_trait]
impl HookModule for FunctionModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn exports(&self) -> Vec<FunctionExport> {
        let mut exports: Vec<FunctionExport> = self
            .functions
            .keys()
            .map(|(name, arity)| FunctionExport::new(name.clone(), *arity))
            .collect();
        exports.sort();
        exports
    }

    fn exports_function(&self, name: &str, arity: usize) -> bool {
        self.functions.contains_key(&(name.to_string(), arity))
    }

    async fn call(&self, function: &str, args: Vec<Value>, ctx: CallContext) -> CalleeResult {
        let arity = args.len();
        match self.functions.get(&(function.to_string(), arity)) {
            Some(handler) => handler(args, ctx).await,
            None => Err(format!("undefined function {}:{}/{}", self.name, function, arity)),
        }
    }

    async fn on_custom_hook(&self, name: &str, args: Vec<Value>, ctx: CallContext) -> CalleeResult {
        match &self.custom_hook {
            Some(handler) => handler(name.to_string(), args, ctx).await,
            None => Err(format!(
                "module '{}' does not handle custom hook '{}'",
                self.name, name
            )),
        }
    }
}

/// Builder returned by [`FunctionModule::builder`].
pub struct FunctionModuleBuilder {
    module: FunctionModule,
}

impl FunctionModuleBuilder {
    /// Exports `name/arity`. A later registration of the same pair wins.
    pub fn function<F, Fut>(mut self, name: &str, arity: usize, handler: F) -> Self
    where
        F: Fn(Vec<Value>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CalleeResult> + Send + 'static,
    {
        self.module.functions.insert(
            (name.to_string(), arity),
            Arc::new(
                move |args: Vec<Value>, ctx: CallContext| -> BoxFuture<'static, CalleeResult> {
                    Box::pin(handler(args, ctx))
                },
            ),
        );
        self
    }

    /// Handles calls to registered exports that have no static function.
    pub fn custom_hooks<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(String, Vec<Value>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CalleeResult> + Send + 'static,
    {
        self.module.custom_hook = Some(Arc::new(
            move |name: String,
                  args: Vec<Value>,
                  ctx: CallContext|
                  -> BoxFuture<'static, CalleeResult> { Box::pin(handler(name, args, ctx)) },
        ));
        self
    }

    /// Finishes the module.
    pub fn build(self) -> FunctionModule {
        self.module
    }

    /// Finishes the module as a shared trait object.
    pub fn into_module(self) -> Arc<dyn HookModule> {
        Arc::new(self.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn module() -> FunctionModule {
        FunctionModule::builder("Echo")
            .function("echo", 1, |args, _ctx| async move { Ok(args[0].clone()) })
            .function("echo", 2, |args, _ctx| async move { Ok(json!(args)) })
            .function("fail", 0, |_args, _ctx| async move { Err("nope".to_string()) })
            .build()
    }

    #[tokio::test]
    async fn test_dispatch_by_name_and_arity() {
        let module = module();
        let ctx = CallContext::default();

        assert_eq!(
            module.call("echo", vec![json!(1)], ctx.clone()).await,
            Ok(json!(1))
        );
        assert_eq!(
            module
                .call("echo", vec![json!(1), json!(2)], ctx.clone())
                .await,
            Ok(json!([1, 2]))
        );
        assert_eq!(
            module.call("fail", vec![], ctx.clone()).await,
            Err("nope".to_string())
        );
        assert!(module.call("echo", vec![], ctx).await.is_err());
    }

    #[test]
    fn test_exports_and_arities() {
        let module = module();
        assert!(module.exports_function("echo", 2));
        assert!(!module.exports_function("echo", 3));
        assert_eq!(module.arities("echo"), vec![1, 2]);
        assert!(module.arities("missing").is_empty());
        assert_eq!(module.exports().len(), 3);
    }

    #[tokio::test]
    async fn test_custom_hook_fallback() {
        let plain = module();
        assert!(
            plain
                .on_custom_hook("dyn", vec![], CallContext::default())
                .await
                .is_err()
        );

        let custom = FunctionModule::builder("Dyn")
            .custom_hooks(|name, args, _ctx| async move { Ok(json!({"name": name, "argc": args.len()})) })
            .build();
        assert_eq!(
            custom
                .on_custom_hook("leaderboard_top", vec![json!(10)], CallContext::default())
                .await,
            Ok(json!({"name": "leaderboard_top", "argc": 1}))
        );
    }
}
