//! Hook system: lifecycle definitions, call policy, and the dispatcher.

pub mod definitions;
pub mod dispatcher;
pub mod policy;

pub use definitions::{LifecycleHook, SafeDefault};
pub use dispatcher::HookDispatcher;
pub use policy::CallPolicy;
