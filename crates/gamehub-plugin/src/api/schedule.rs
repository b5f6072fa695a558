//! Scheduler API available to extension code through [`CallContext`].
//!
//! [`CallContext`]: super::context::CallContext

use async_trait::async_trait;
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// The job fires on its schedule.
    Registered,
    /// The job was cancelled and will not fire again.
    Cancelled,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Public view of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobInfo {
    /// Job name, also the lock-table key.
    pub name: String,
    /// Normalized cron expression (minute hour day-of-month month day-of-week).
    pub schedule: String,
    /// Callback invoked through the hook dispatcher.
    pub callback: String,
    /// Current state.
    pub state: JobState,
}

/// Options for [`ScheduleRequest::Hourly`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourlyOptions {
    /// Minute past the hour, 0-59.
    pub minute: u32,
}

/// Options for [`ScheduleRequest::Daily`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyOptions {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Minute of hour, 0-59.
    pub minute: u32,
}

/// Options for [`ScheduleRequest::Weekly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyOptions {
    /// Day of week.
    pub weekday: Weekday,
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Minute of hour, 0-59.
    pub minute: u32,
}

impl Default for WeeklyOptions {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour: 0,
            minute: 0,
        }
    }
}

/// A request to register a recurring job.
///
/// Every form except [`ScheduleRequest::Cron`] uses the callback name as the
/// job name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleRequest {
    /// Every `minutes` minutes, aligned to the top of the hour.
    EveryMinutes {
        /// Interval in minutes, 1-59.
        minutes: u32,
        /// Callback name.
        callback: String,
    },
    /// Once per hour.
    Hourly {
        /// Callback name.
        callback: String,
        /// Timing.
        options: HourlyOptions,
    },
    /// Once per day.
    Daily {
        /// Callback name.
        callback: String,
        /// Timing.
        options: DailyOptions,
    },
    /// Once per week.
    Weekly {
        /// Callback name.
        callback: String,
        /// Timing.
        options: WeeklyOptions,
    },
    /// A raw five-field cron expression.
    Cron {
        /// Job name.
        name: String,
        /// Cron expression.
        expression: String,
        /// Callback name.
        callback: String,
    },
}

impl ScheduleRequest {
    /// `every_minutes(n, callback)`.
    pub fn every_minutes(minutes: u32, callback: impl Into<String>) -> Self {
        Self::EveryMinutes {
            minutes,
            callback: callback.into(),
        }
    }

    /// `hourly(callback, opts)`.
    pub fn hourly(callback: impl Into<String>, options: HourlyOptions) -> Self {
        Self::Hourly {
            callback: callback.into(),
            options,
        }
    }

    /// `daily(callback, opts)`.
    pub fn daily(callback: impl Into<String>, options: DailyOptions) -> Self {
        Self::Daily {
            callback: callback.into(),
            options,
        }
    }

    /// `weekly(callback, opts)`.
    pub fn weekly(callback: impl Into<String>, options: WeeklyOptions) -> Self {
        Self::Weekly {
            callback: callback.into(),
            options,
        }
    }

    /// `cron(name, expression, callback)`.
    pub fn cron(
        name: impl Into<String>,
        expression: impl Into<String>,
        callback: impl Into<String>,
    ) -> Self {
        Self::Cron {
            name: name.into(),
            expression: expression.into(),
            callback: callback.into(),
        }
    }

    /// The job name this request registers under.
    pub fn job_name(&self) -> &str {
        match self {
            Self::Cron { name, .. } => name,
            other => other.callback(),
        }
    }

    /// The callback this request invokes.
    pub fn callback(&self) -> &str {
        match self {
            Self::EveryMinutes { callback, .. }
            | Self::Hourly { callback, .. }
            | Self::Daily { callback, .. }
            | Self::Weekly { callback, .. }
            | Self::Cron { callback, .. } => callback,
        }
    }
}

/// Registration surface of the scheduled job coordinator.
#[async_trait]
pub trait SchedulerService: Send + Sync {
    /// Registers a job, replacing any job with the same name.
    async fn schedule(&self, request: ScheduleRequest) -> Result<ScheduledJobInfo, String>;

    /// Stops future firings of a job.
    async fn cancel(&self, name: &str) -> Result<ScheduledJobInfo, String>;

    /// All jobs known to this host, including cancelled ones.
    async fn jobs(&self) -> Vec<ScheduledJobInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_defaults_to_callback() {
        let request = ScheduleRequest::daily(
            "report_job",
            DailyOptions {
                hour: 9,
                minute: 0,
            },
        );
        assert_eq!(request.job_name(), "report_job");
        assert_eq!(request.callback(), "report_job");

        let request = ScheduleRequest::cron("nightly", "0 3 * * *", "compact");
        assert_eq!(request.job_name(), "nightly");
        assert_eq!(request.callback(), "compact");
    }
}
