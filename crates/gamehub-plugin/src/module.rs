//! The contract every loaded code unit implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::context::CallContext;

/// Name of the function a plugin's hooks module exports to register RPC
/// exports at startup.
pub const STARTUP_FUNCTION: &str = "on_startup";

/// Result of running extension code. Errors carry a human-readable detail.
pub type CalleeResult = Result<Value, String>;

/// A function a module exports statically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionExport {
    /// Function name.
    pub name: String,
    /// Number of positional arguments.
    pub arity: usize,
}

impl FunctionExport {
    /// Creates an export entry.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

/// A function name with every arity it is exported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFunction {
    /// Function name.
    pub name: String,
    /// Exported arities, ascending.
    pub arities: Vec<usize>,
}

/// A loaded code unit that can be called by name.
///
/// Lifecycle callbacks, RPC functions, and scheduled callbacks all resolve
/// against this interface. Functions that are not exported statically can
/// still be reached through [`HookModule::on_custom_hook`] when the owning
/// plugin registered them as exports.
#[async_trait]
pub trait HookModule: Send + Sync + std::fmt::Debug {
    /// Module identifier, unique across loaded packages.
    fn name(&self) -> &str;

    /// Statically exported functions.
    fn exports(&self) -> Vec<FunctionExport>;

    /// Calls an exported function.
    async fn call(&self, function: &str, args: Vec<Value>, ctx: CallContext) -> CalleeResult;

    /// Generic dynamic-call entry point for registered exports.
    async fn on_custom_hook(&self, name: &str, args: Vec<Value>, ctx: CallContext) -> CalleeResult {
        let _ = (args, ctx);
        Err(format!(
            "module '{}' does not handle custom hook '{}'",
            self.name(),
            name
        ))
    }

    /// Whether `name/arity` is exported.
    fn exports_function(&self, name: &str, arity: usize) -> bool {
        self.exports()
            .iter()
            .any(|export| export.name == name && export.arity == arity)
    }

    /// All arities `name` is exported under, ascending.
    fn arities(&self, name: &str) -> Vec<usize> {
        let mut arities: Vec<usize> = self
            .exports()
            .into_iter()
            .filter(|export| export.name == name)
            .map(|export| export.arity)
            .collect();
        arities.sort_unstable();
        arities.dedup();
        arities
    }
}

/// Groups a module's exports by function name.
pub fn group_exports(exports: Vec<FunctionExport>) -> Vec<ExportedFunction> {
    let mut grouped: std::collections::BTreeMap<String, Vec<usize>> = Default::default();
    for export in exports {
        grouped.entry(export.name).or_default().push(export.arity);
    }
    grouped
        .into_iter()
        .map(|(name, mut arities)| {
            arities.sort_unstable();
            arities.dedup();
            ExportedFunction { name, arities }
        })
        .collect()
}
