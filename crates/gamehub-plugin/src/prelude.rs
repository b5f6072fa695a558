//! Prelude for convenient imports.

pub use async_trait::async_trait;
pub use serde_json::{Value, json};

pub use crate::api::context::{CallContext, Caller, CallOptions, HostServices};
pub use crate::api::schedule::{
    DailyOptions, HourlyOptions, JobState, ScheduleRequest, ScheduledJobInfo, SchedulerService,
    WeeklyOptions,
};
pub use crate::error::HookError;
pub use crate::hooks::definitions::LifecycleHook;
pub use crate::loader::PluginPackage;
pub use crate::module::{CalleeResult, FunctionExport, HookModule, STARTUP_FUNCTION};
pub use crate::traits::FunctionModule;

pub use crate::declare_plugin;
pub use crate::export_list;
