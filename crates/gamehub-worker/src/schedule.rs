//! Schedule normalization and period keys.
//!
//! Every convenience form is reduced to a five-field cron expression
//! (minute, hour, day of month, month, day of week) evaluated in UTC. All
//! schedules are minute-granular, so a firing is identified by its
//! scheduled minute.

use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc, Weekday};
use cron::Schedule;

use gamehub_core::error::AppError;
use gamehub_core::result::AppResult;
use gamehub_plugin::api::schedule::ScheduleRequest;
use gamehub_plugin::exports::is_valid_hook_name;

/// Builds the five-field cron expression for a request.
pub fn cron_expression(request: &ScheduleRequest) -> AppResult<String> {
    validate_name("job name", request.job_name())?;
    validate_name("callback", request.callback())?;

    match request {
        ScheduleRequest::EveryMinutes { minutes, .. } => {
            if !(1..=59).contains(minutes) {
                return Err(AppError::validation(format!(
                    "every_minutes interval must be between 1 and 59, got {minutes}"
                )));
            }
            Ok(format!("*/{minutes} * * * *"))
        }
        ScheduleRequest::Hourly { options, .. } => {
            check_minute(options.minute)?;
            Ok(format!("{} * * * *", options.minute))
        }
        ScheduleRequest::Daily { options, .. } => {
            check_hour(options.hour)?;
            check_minute(options.minute)?;
            Ok(format!("{} {} * * *", options.minute, options.hour))
        }
        ScheduleRequest::Weekly { options, .. } => {
            check_hour(options.hour)?;
            check_minute(options.minute)?;
            Ok(format!(
                "{} {} * * {}",
                options.minute,
                options.hour,
                weekday_name(options.weekday)
            ))
        }
        ScheduleRequest::Cron { expression, .. } => normalize_cron(expression),
    }
}

/// Converts a five-field expression into the scheduler's six-field form
/// (leading seconds field).
pub fn scheduler_expression(expression: &str) -> String {
    format!("0 {expression}")
}

/// Lock-table key for the firing scheduled at `fire_time`.
pub fn period_key(fire_time: DateTime<Utc>) -> String {
    truncate_to_minute(fire_time)
        .format("%Y-%m-%dT%H:%MZ")
        .to_string()
}

/// Oldest scheduled minute a late firing is still attributed to.
const MAX_FIRE_DELAY_MINUTES: i64 = 60;

/// The scheduled minute a firing observed at `now` belongs to.
///
/// This is the latest minute at or before `now` matched by `expression`, so
/// a callback started late keeps the period key of the tick that fired it.
/// Falls back to the current minute when the expression cannot be evaluated
/// or its latest match is more than an hour old.
pub fn scheduled_fire_time(expression: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let current = truncate_to_minute(now);
    let Ok(schedule) = Schedule::from_str(&scheduler_expression(&named_weekdays(expression)))
    else {
        return current;
    };

    schedule
        .after(&(current + Duration::seconds(59)))
        .next_back()
        .filter(|at| *at <= current && current - *at <= Duration::minutes(MAX_FIRE_DELAY_MINUTES))
        .unwrap_or(current)
}

/// Drops seconds and sub-seconds.
pub fn truncate_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

fn normalize_cron(expression: &str) -> AppResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(AppError::validation(format!(
            "cron expression '{expression}' must have 5 fields, got {}",
            fields.len()
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-' | '?');
    if let Some(field) = fields.iter().find(|f| !f.chars().all(allowed)) {
        return Err(AppError::validation(format!(
            "cron field '{field}' contains unsupported characters"
        )));
    }
    Ok(fields.join(" "))
}

/// Rewrites numeric day-of-week values (0 and 7 are Sunday) as names, which
/// every cron dialect reads the same way.
fn named_weekdays(expression: &str) -> String {
    let mut fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
    let Some(weekdays) = fields.get_mut(4) else {
        return expression.to_string();
    };

    let items: Vec<String> = weekdays
        .split(',')
        .map(|item| {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (item, None),
            };
            let range = range
                .split('-')
                .map(|part| part.parse::<u8>().ok().and_then(weekday_number).unwrap_or(part))
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{range}/{step}"),
                None => range,
            }
        })
        .collect();
    *weekdays = items.join(",");
    fields.join(" ")
}

fn weekday_number(day: u8) -> Option<&'static str> {
    let weekday = match day {
        0 | 7 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => return None,
    };
    Some(weekday_name(weekday))
}

fn validate_name(what: &str, name: &str) -> AppResult<()> {
    if is_valid_hook_name(name) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{what} '{name}' must match [A-Za-z0-9_]+"
        )))
    }
}

fn check_minute(minute: u32) -> AppResult<()> {
    if minute < 60 {
        Ok(())
    } else {
        Err(AppError::validation(format!("minute must be 0-59, got {minute}")))
    }
}

fn check_hour(hour: u32) -> AppResult<()> {
    if hour < 24 {
        Ok(())
    } else {
        Err(AppError::validation(format!("hour must be 0-23, got {hour}")))
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use gamehub_plugin::api::schedule::{DailyOptions, HourlyOptions, WeeklyOptions};

    #[test]
    fn test_convenience_forms() {
        assert_eq!(
            cron_expression(&ScheduleRequest::every_minutes(15, "tick")).unwrap(),
            "*/15 * * * *"
        );
        assert_eq!(
            cron_expression(&ScheduleRequest::hourly("tick", HourlyOptions { minute: 30 }))
                .unwrap(),
            "30 * * * *"
        );
        assert_eq!(
            cron_expression(&ScheduleRequest::daily(
                "report_job",
                DailyOptions { hour: 9, minute: 0 }
            ))
            .unwrap(),
            "0 9 * * *"
        );
        assert_eq!(
            cron_expression(&ScheduleRequest::weekly(
                "weekly_reset",
                WeeklyOptions {
                    weekday: Weekday::Sun,
                    hour: 23,
                    minute: 45
                }
            ))
            .unwrap(),
            "45 23 * * SUN"
        );
        assert_eq!(scheduler_expression("0 9 * * *"), "0 0 9 * * *");
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(cron_expression(&ScheduleRequest::every_minutes(0, "tick")).is_err());
        assert!(cron_expression(&ScheduleRequest::every_minutes(60, "tick")).is_err());
        assert!(
            cron_expression(&ScheduleRequest::daily(
                "tick",
                DailyOptions {
                    hour: 24,
                    minute: 0
                }
            ))
            .is_err()
        );
        assert!(cron_expression(&ScheduleRequest::every_minutes(5, "bad-name")).is_err());
    }

    #[test]
    fn test_raw_cron() {
        assert_eq!(
            cron_expression(&ScheduleRequest::cron("nightly", "  0  3 * *   MON-FRI ", "compact"))
                .unwrap(),
            "0 3 * * MON-FRI"
        );
        assert!(cron_expression(&ScheduleRequest::cron("nightly", "0 3 * *", "compact")).is_err());
        assert!(
            cron_expression(&ScheduleRequest::cron("nightly", "0 3 * * $", "compact")).is_err()
        );
    }

    #[test]
    fn test_period_key_is_minute_granular() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 42).unwrap();
        assert_eq!(period_key(at), "2026-03-14T09:00Z");
        assert_eq!(
            truncate_to_minute(at),
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_late_firing_keeps_scheduled_minute() {
        let at = |h, m, s| Utc.with_ymd_and_hms(2026, 3, 14, h, m, s).unwrap();

        assert_eq!(scheduled_fire_time("0 9 * * *", at(9, 0, 0)), at(9, 0, 0));
        assert_eq!(scheduled_fire_time("0 9 * * *", at(9, 1, 30)), at(9, 0, 0));
        assert_eq!(scheduled_fire_time("*/5 * * * *", at(9, 7, 10)), at(9, 5, 0));
        assert_eq!(period_key(scheduled_fire_time("0 9 * * *", at(9, 2, 5))), "2026-03-14T09:00Z");
    }

    #[test]
    fn test_numeric_weekdays_match_scheduler() {
        // 2026-03-14 is a Saturday.
        let saturday = Utc.with_ymd_and_hms(2026, 3, 14, 9, 2, 0).unwrap();
        let nine = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(scheduled_fire_time("0 9 * * 6", saturday), nine);
        assert_eq!(scheduled_fire_time("0 9 * * 1-6", saturday), nine);

        let sunday = Utc.with_ymd_and_hms(2026, 3, 15, 9, 1, 0).unwrap();
        let sunday_nine = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap();
        assert_eq!(scheduled_fire_time("0 9 * * 0", sunday), sunday_nine);
        assert_eq!(scheduled_fire_time("0 9 * * 7", sunday), sunday_nine);
        assert_eq!(named_weekdays("0 9 * * 1-5,0"), "0 9 * * MON-FRI,SUN");
    }

    #[test]
    fn test_fire_time_falls_back_to_current_minute() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 20).unwrap();
        let current = Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap();
        assert_eq!(scheduled_fire_time("0 9 * * *", now), current);
        assert_eq!(scheduled_fire_time("not a cron", now), current);
    }
}
