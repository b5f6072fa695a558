//! Call policy: which function names outside callers may reach.

use std::collections::HashSet;

use dashmap::DashSet;
use tracing::{debug, info};

use crate::error::HookError;

/// Gatekeeper applied by [`HookDispatcher::call`].
///
/// A name is callable when it is on the allow-list (or no allow-list is
/// configured) and it is not a protected scheduled callback.
///
/// [`HookDispatcher::call`]: super::dispatcher::HookDispatcher::call
#[derive(Debug, Default)]
pub struct CallPolicy {
    allow_list: Option<HashSet<String>>,
    protected: DashSet<String>,
}

impl CallPolicy {
    /// Creates a policy. `None` allows every exported name.
    pub fn new(allow_list: Option<Vec<String>>) -> Self {
        Self {
            allow_list: allow_list.map(|names| names.into_iter().collect()),
            protected: DashSet::new(),
        }
    }

    /// Marks a scheduled callback as not callable through RPC.
    pub fn protect(&self, name: &str) -> bool {
        let added = self.protected.insert(name.to_string());
        if added {
            info!(hook = %name, "Callback protected from external calls");
        }
        added
    }

    /// Lifts protection from a callback.
    pub fn unprotect(&self, name: &str) -> bool {
        let removed = self.protected.remove(name).is_some();
        if removed {
            debug!(hook = %name, "Callback protection lifted");
        }
        removed
    }

    /// Whether `name` is a protected callback.
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }

    /// Protected names, sorted.
    pub fn protected_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.protected.iter().map(|n| n.key().clone()).collect();
        names.sort();
        names
    }

    /// Whether the allow-list admits `name`.
    pub fn is_allow_listed(&self, name: &str) -> bool {
        self.allow_list
            .as_ref()
            .is_none_or(|allowed| allowed.contains(name))
    }

    /// Rejects protected or non-allow-listed names.
    pub fn check(&self, name: &str) -> Result<(), HookError> {
        if self.is_protected(name) || !self.is_allow_listed(name) {
            return Err(HookError::NotAllowed(name.to_string()));
        }
        Ok(())
    }
}
