//! Call context: caller identity and host services available to callees.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use gamehub_core::traits::accounts::AccountsService;
use gamehub_core::types::user::UserRecord;

use super::schedule::SchedulerService;

/// Identity of whoever triggered a call.
///
/// Domain code may pass either a bare user id or a full user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Caller {
    /// A user id.
    Id(i64),
    /// A user record carrying at least an `id` field.
    Record(Map<String, Value>),
}

impl Caller {
    /// Resolves the caller's user id.
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Record(record) => record.get("id").and_then(|id| {
                id.as_i64()
                    .or_else(|| id.as_str().and_then(|s| s.parse().ok()))
            }),
        }
    }
}

impl From<i64> for Caller {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&UserRecord> for Caller {
    fn from(user: &UserRecord) -> Self {
        match serde_json::to_value(user) {
            Ok(Value::Object(record)) => Self::Record(record),
            _ => Self::Id(user.id),
        }
    }
}

/// Per-call options accepted by the dispatcher and the plugin registry.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Who triggered the call.
    pub caller: Option<Caller>,
    /// Overrides the configured timeout.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Empty options: no caller, configured timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the caller.
    pub fn with_caller(mut self, caller: impl Into<Caller>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    /// Sets a timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Default)]
struct HostServicesInner {
    accounts: Option<Arc<dyn AccountsService>>,
    scheduler: OnceLock<Weak<dyn SchedulerService>>,
}

/// Services the host lends to extension code.
///
/// The scheduler is attached after construction and held weakly: the
/// scheduler itself owns the dispatcher that hands these services out.
#[derive(Clone, Default)]
pub struct HostServices {
    inner: Arc<HostServicesInner>,
}

impl HostServices {
    /// Creates host services with an optional accounts collaborator.
    pub fn new(accounts: Option<Arc<dyn AccountsService>>) -> Self {
        Self {
            inner: Arc::new(HostServicesInner {
                accounts,
                scheduler: OnceLock::new(),
            }),
        }
    }

    /// Attaches the scheduler. Only the first attachment takes effect.
    pub fn attach_scheduler(&self, scheduler: &Arc<dyn SchedulerService>) -> bool {
        let attached = self.inner.scheduler.set(Arc::downgrade(scheduler)).is_ok();
        if !attached {
            warn!("Scheduler already attached to host services, ignoring");
        }
        attached
    }

    /// Accounts collaborator, if configured.
    pub fn accounts(&self) -> Option<&Arc<dyn AccountsService>> {
        self.inner.accounts.as_ref()
    }

    /// Scheduler, if attached and still alive.
    pub fn scheduler(&self) -> Option<Arc<dyn SchedulerService>> {
        self.inner.scheduler.get().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("accounts", &self.inner.accounts.is_some())
            .field("scheduler", &self.scheduler().is_some())
            .finish()
    }
}

/// Context passed to every callee.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    caller: Option<Caller>,
    plugin: Option<String>,
    services: HostServices,
}

impl CallContext {
    /// Creates a context for a call made by `caller`.
    pub fn new(caller: Option<Caller>, services: HostServices) -> Self {
        Self {
            caller,
            plugin: None,
            services,
        }
    }

    /// Marks the plugin on whose behalf the call runs.
    pub fn for_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// The caller, exactly as supplied.
    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    /// The caller's user id.
    pub fn caller_id(&self) -> Option<i64> {
        self.caller.as_ref().and_then(Caller::id)
    }

    /// Looks up the caller's user record through the accounts service.
    ///
    /// Returns `None` when there is no caller, no accounts service, no
    /// matching user, or the lookup fails.
    pub async fn caller_user(&self) -> Option<UserRecord> {
        let id = self.caller_id()?;
        let accounts = self.services.accounts()?;
        match accounts.find_user(id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = id, error = %e, "Caller lookup failed");
                None
            }
        }
    }

    /// Plugin on whose behalf the call runs, for RPC and startup calls.
    pub fn plugin(&self) -> Option<&str> {
        self.plugin.as_deref()
    }

    /// The job scheduler, when one is running.
    pub fn scheduler(&self) -> Option<Arc<dyn SchedulerService>> {
        self.services.scheduler()
    }

    /// All host services.
    pub fn services(&self) -> &HostServices {
        &self.services
    }
}
