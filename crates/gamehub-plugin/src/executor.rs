//! Bounded-time, bounded-concurrency execution of extension code.
//!
//! Every callee runs on its own Tokio task so a panic or a stuck call cannot
//! take down the caller. A semaphore caps the number of calls in flight; when
//! it is exhausted new calls are dropped with [`HookError::Overloaded`]
//! instead of queueing. Scheduled work instead [`reserve`](CallExecutor::reserve)s
//! a slot up front, waiting a bounded time for one to free up. On timeout the
//! task is aborted and its result discarded, although code that never yields
//! may keep running until it does.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, warn};

use gamehub_core::config::HookConfig;

use crate::api::context::CallContext;
use crate::error::HookError;
use crate::module::HookModule;

/// What a call resolves to on the target module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    /// A statically exported function.
    Function,
    /// The module's dynamic `on_custom_hook` entry point.
    CustomHook,
}

/// A fully resolved call waiting to run.
#[derive(Debug)]
pub struct Invocation {
    module: Arc<dyn HookModule>,
    target: CallTarget,
    name: String,
    args: Vec<Value>,
    ctx: CallContext,
}

impl Invocation {
    /// Calls a statically exported function.
    pub fn function(
        module: Arc<dyn HookModule>,
        name: impl Into<String>,
        args: Vec<Value>,
        ctx: CallContext,
    ) -> Self {
        Self {
            module,
            target: CallTarget::Function,
            name: name.into(),
            args,
            ctx,
        }
    }

    /// Calls the module's custom-hook entry point.
    pub fn custom_hook(
        module: Arc<dyn HookModule>,
        name: impl Into<String>,
        args: Vec<Value>,
        ctx: CallContext,
    ) -> Self {
        Self {
            module,
            target: CallTarget::CustomHook,
            name: name.into(),
            args,
            ctx,
        }
    }

    /// Function or hook name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the call resolves.
    pub fn target(&self) -> CallTarget {
        self.target
    }
}

/// A concurrency slot held ahead of a call. Dropping it frees the slot.
#[derive(Debug)]
pub struct CallSlot {
    permit: OwnedSemaphorePermit,
}

/// Runs invocations with a timeout and a concurrency cap.
#[derive(Debug, Clone)]
pub struct CallExecutor {
    permits: Arc<Semaphore>,
    capacity: usize,
    default_timeout: Duration,
}

impl CallExecutor {
    /// Creates an executor allowing `max_concurrent_calls` calls in flight.
    pub fn new(max_concurrent_calls: usize, default_timeout: Duration) -> Self {
        let capacity = max_concurrent_calls.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            default_timeout,
        }
    }

    /// Creates an executor from the `[hooks]` configuration section.
    pub fn from_config(config: &HookConfig) -> Self {
        Self::new(config.max_concurrent_calls, config.timeout())
    }

    /// Timeout applied when a call does not override it.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Number of calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Runs an invocation, taking a concurrency slot for its whole lifetime.
    pub async fn run(
        &self,
        invocation: Invocation,
        timeout: Option<Duration>,
    ) -> Result<Value, HookError> {
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            warn!(
                hook = %invocation.name,
                capacity = self.capacity,
                "Call executor saturated, dropping call"
            );
            return Err(HookError::Overloaded(invocation.name));
        };

        self.run_in_slot(CallSlot { permit }, invocation, timeout)
            .await
    }

    /// Waits up to `wait` for a free slot.
    pub async fn reserve(&self, name: &str, wait: Duration) -> Result<CallSlot, HookError> {
        match tokio::time::timeout(wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(CallSlot { permit }),
            _ => {
                warn!(
                    hook = %name,
                    capacity = self.capacity,
                    wait_ms = wait.as_millis() as u64,
                    "No call slot freed up in time"
                );
                Err(HookError::Overloaded(name.to_string()))
            }
        }
    }

    /// Runs an invocation in a previously reserved slot, releasing it when
    /// the call ends.
    pub async fn run_in_slot(
        &self,
        slot: CallSlot,
        invocation: Invocation,
        timeout: Option<Duration>,
    ) -> Result<Value, HookError> {
        let name = invocation.name.clone();
        let Invocation {
            module,
            target,
            name: function,
            args,
            ctx,
        } = invocation;

        let task = async move {
            let _permit = slot.permit;
            match target {
                CallTarget::Function => module.call(&function, args, ctx).await,
                CallTarget::CustomHook => module.on_custom_hook(&function, args, ctx).await,
            }
        };

        self.guard(&name, timeout.unwrap_or(self.default_timeout), task)
            .await
    }

    /// Runs arbitrary extension code under a timeout without taking a slot.
    ///
    /// Used for package start-up, which runs once per reload.
    pub async fn guard<F, T>(&self, name: &str, timeout: Duration, task: F) -> Result<T, HookError>
    where
        F: Future<Output = Result<T, String>> + Send + 'static,
        T: Send + 'static,
    {
        let mut handle = tokio::spawn(task);

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(value))) => {
                debug!(hook = %name, "Extension call completed");
                Ok(value)
            }
            Ok(Ok(Err(detail))) => {
                warn!(hook = %name, error = %detail, "Extension call returned an error");
                Err(HookError::Exception {
                    name: name.to_string(),
                    detail,
                })
            }
            Ok(Err(join_error)) => {
                let detail = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                error!(hook = %name, error = %detail, "Extension call panicked");
                Err(HookError::Exception {
                    name: name.to_string(),
                    detail,
                })
            }
            Err(_) => {
                handle.abort();
                warn!(hook = %name, timeout_ms = timeout.as_millis() as u64, "Extension call timed out");
                Err(HookError::Timeout {
                    name: name.to_string(),
                    after: timeout,
                })
            }
        }
    }
}

impl Default for CallExecutor {
    fn default() -> Self {
        Self::from_config(&HookConfig::default())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}
