//! # gamehub-plugin-sdk
//!
//! SDK for developing GameHub plugins.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use gamehub_plugin_sdk::prelude::*;
//!
//! #[derive(Debug)]
//! struct MyPackage;
//!
//! #[async_trait]
//! impl PluginPackage for MyPackage {
//!     fn package_id(&self) -> &str {
//!         "my_plugin"
//!     }
//!
//!     fn modules(&self) -> Vec<Arc<dyn HookModule>> {
//!         vec![
//!             FunctionModule::builder("MyHooks")
//!                 .function("greet", 1, |args, _ctx| async move {
//!                     Ok(json!(format!("hello {}", args[0])))
//!                 })
//!                 .function(STARTUP_FUNCTION, 0, |_args, _ctx| async {
//!                     Ok(export_list!["top_scores"])
//!                 })
//!                 .into_module(),
//!         ]
//!     }
//! }
//!
//! declare_plugin!(MyPackage);
//! ```
//!
//! The compiled library ships next to a `plugin.toml`:
//!
//! ```toml
//! package = "my_plugin"
//! hooks_module = "MyHooks"
//! ```

/// Prelude for convenient imports.
pub mod prelude {
    pub use gamehub_plugin::prelude::*;

    pub use gamehub_core::types::user::UserRecord;
    pub use chrono::Weekday;
}

pub use gamehub_plugin::{declare_plugin, export_list};

/// Reads a string argument, failing with a message callees can return as-is.
pub fn string_arg(args: &[serde_json::Value], index: usize) -> Result<&str, String> {
    args.get(index)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| format!("argument {index} must be a string"))
}

/// Reads an integer argument.
pub fn int_arg(args: &[serde_json::Value], index: usize) -> Result<i64, String> {
    args.get(index)
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| format!("argument {index} must be an integer"))
}
