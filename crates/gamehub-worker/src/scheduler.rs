//! Scheduled job coordinator.
//!
//! Jobs are registered on a [`JobScheduler`] and, when due, race for a row in
//! the shared schedule lock table. Only the host that inserts the row for a
//! `(job_name, period_key)` pair invokes the callback, so each firing runs at
//! most once across the cluster. A host claims a period only after it holds a
//! call slot, so a claimed period is never dropped for lack of capacity.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use gamehub_core::config::SchedulerConfig;
use gamehub_core::error::AppError;
use gamehub_core::result::AppResult;
use gamehub_core::traits::schedule_lock::ScheduleLockStore;
use gamehub_plugin::HookDispatcher;
use gamehub_plugin::api::schedule::{
    DailyOptions, HourlyOptions, JobState, ScheduleRequest, ScheduledJobInfo, SchedulerService,
    WeeklyOptions,
};
use gamehub_plugin::error::HookError;

use crate::schedule::{
    cron_expression, period_key, scheduled_fire_time, scheduler_expression, truncate_to_minute,
};

/// Minimum spacing between opportunistic lock cleanups.
const CLEANUP_INTERVAL_MINUTES: i64 = 60;

/// What happened when a job came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// This host owned the period and invoked the callback.
    Executed(Result<(), HookError>),
    /// Another host already owns the period.
    Contended,
    /// No call slot freed up in time. The period was left unclaimed.
    Saturated,
    /// The job is unknown or cancelled.
    Inactive,
}

#[derive(Debug)]
struct JobEntry {
    info: ScheduledJobInfo,
    job_id: Option<Uuid>,
}

/// Registers recurring jobs and runs each firing at most once cluster-wide.
pub struct ScheduledJobCoordinator {
    scheduler: JobScheduler,
    dispatcher: Arc<HookDispatcher>,
    locks: Arc<dyn ScheduleLockStore>,
    jobs: Mutex<BTreeMap<String, JobEntry>>,
    retention: Duration,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
    this: Weak<ScheduledJobCoordinator>,
}

impl std::fmt::Debug for ScheduledJobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJobCoordinator")
            .field("retention", &self.retention)
            .finish()
    }
}

impl ScheduledJobCoordinator {
    /// Create a coordinator and attach it to the dispatcher's host services,
    /// so extension code can schedule jobs through its call context.
    pub async fn new(
        dispatcher: Arc<HookDispatcher>,
        locks: Arc<dyn ScheduleLockStore>,
        config: &SchedulerConfig,
    ) -> AppResult<Arc<Self>> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        let coordinator = Arc::new_cyclic(|this| Self {
            scheduler,
            dispatcher,
            locks,
            jobs: Mutex::new(BTreeMap::new()),
            retention: Duration::days(i64::from(config.lock_retention_days)),
            last_cleanup: Mutex::new(None),
            this: this.clone(),
        });

        let service: Arc<dyn SchedulerService> = coordinator.clone();
        if !coordinator.dispatcher.services().attach_scheduler(&service) {
            warn!("Host services already had a scheduler attached");
        }

        Ok(coordinator)
    }

    /// Start firing registered jobs.
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        info!("Scheduled job coordinator started");
        Ok(())
    }

    /// Stop the underlying scheduler.
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        info!("Scheduled job coordinator shut down");
        Ok(())
    }

    /// Run `callback` every `minutes` minutes.
    pub async fn every_minutes(
        &self,
        minutes: u32,
        callback: &str,
    ) -> AppResult<ScheduledJobInfo> {
        self.register(ScheduleRequest::every_minutes(minutes, callback))
            .await
    }

    /// Run `callback` once per hour.
    pub async fn hourly(&self, callback: &str, options: HourlyOptions) -> AppResult<ScheduledJobInfo> {
        self.register(ScheduleRequest::hourly(callback, options)).await
    }

    /// Run `callback` once per day.
    pub async fn daily(&self, callback: &str, options: DailyOptions) -> AppResult<ScheduledJobInfo> {
        self.register(ScheduleRequest::daily(callback, options)).await
    }

    /// Run `callback` once per week.
    pub async fn weekly(&self, callback: &str, options: WeeklyOptions) -> AppResult<ScheduledJobInfo> {
        self.register(ScheduleRequest::weekly(callback, options)).await
    }

    /// Run `callback` on a raw five-field cron expression under `name`.
    pub async fn cron(
        &self,
        name: &str,
        expression: &str,
        callback: &str,
    ) -> AppResult<ScheduledJobInfo> {
        self.register(ScheduleRequest::cron(name, expression, callback))
            .await
    }

    /// Register a job, replacing any job with the same name.
    pub async fn register(&self, request: ScheduleRequest) -> AppResult<ScheduledJobInfo> {
        let expression = cron_expression(&request)?;
        let name = request.job_name().to_string();
        let callback = request.callback().to_string();

        let job = self.build_job(&name, &expression)?;

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.remove(&name) {
            self.remove_scheduled(&previous).await?;
            if previous.info.callback != callback {
                self.release_callback(&jobs, &previous.info.callback);
            }
            debug!(job = %name, "Replacing scheduled job");
        }

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add job '{name}': {e}")))?;

        self.dispatcher.policy().protect(&callback);

        let info = ScheduledJobInfo {
            name: name.clone(),
            schedule: expression,
            callback,
            state: JobState::Registered,
        };
        jobs.insert(
            name.clone(),
            JobEntry {
                info: info.clone(),
                job_id: Some(job_id),
            },
        );

        info!(
            job = %name,
            schedule = %info.schedule,
            callback = %info.callback,
            "Registered scheduled job"
        );
        Ok(info)
    }

    /// Stop future firings of a job. A firing already in progress completes.
    pub async fn cancel(&self, name: &str) -> AppResult<ScheduledJobInfo> {
        let mut jobs = self.jobs.lock().await;
        let Some(mut entry) = jobs.remove(name) else {
            return Err(AppError::not_found(format!("Scheduled job '{name}' not found")));
        };

        self.remove_scheduled(&entry).await?;
        entry.job_id = None;
        entry.info.state = JobState::Cancelled;
        self.release_callback(&jobs, &entry.info.callback);

        let info = entry.info.clone();
        jobs.insert(name.to_string(), entry);

        info!(job = %name, "Cancelled scheduled job");
        Ok(info)
    }

    /// All known jobs, cancelled ones included, ordered by name.
    pub async fn list(&self) -> Vec<ScheduledJobInfo> {
        self.jobs
            .lock()
            .await
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Callback names of registered jobs. These are rejected by
    /// [`HookDispatcher::call`].
    pub async fn registered_callbacks(&self) -> Vec<String> {
        let mut callbacks: Vec<String> = self
            .jobs
            .lock()
            .await
            .values()
            .filter(|entry| entry.info.state == JobState::Registered)
            .map(|entry| entry.info.callback.clone())
            .collect();
        callbacks.sort();
        callbacks.dedup();
        callbacks
    }

    /// Handle one due firing of `job_name` scheduled for `fire_time`.
    ///
    /// Lock contention is a normal skip. Callback failures are logged and
    /// returned inside [`FireOutcome::Executed`]; only lock store failures
    /// surface as errors.
    pub async fn fire(&self, job_name: &str, fire_time: DateTime<Utc>) -> AppResult<FireOutcome> {
        let info = {
            let jobs = self.jobs.lock().await;
            match jobs.get(job_name) {
                Some(entry) if entry.info.state == JobState::Registered => entry.info.clone(),
                _ => {
                    debug!(job = %job_name, "Skipping firing of inactive job");
                    return Ok(FireOutcome::Inactive);
                }
            }
        };

        let key = period_key(fire_time);
        let slot = match self.dispatcher.reserve_slot(&info.callback).await {
            Ok(slot) => slot,
            Err(e) => {
                warn!(
                    job = %job_name,
                    period_key = %key,
                    error = %e,
                    "No call slot for scheduled job, leaving period unclaimed"
                );
                return Ok(FireOutcome::Saturated);
            }
        };

        let outcome = self.locks.try_acquire(job_name, &key, Utc::now()).await?;
        if !outcome.is_acquired() {
            debug!(job = %job_name, period_key = %key, "Period owned by another host");
            return Ok(FireOutcome::Contended);
        }

        let context = json!({
            "triggered_at": truncate_to_minute(fire_time).to_rfc3339(),
            "job_name": info.name,
            "schedule": info.schedule,
        });

        let result = self
            .dispatcher
            .invoke_in_slot(slot, &info.callback, context)
            .await;
        match &result {
            Ok(()) => info!(
                job = %job_name,
                period_key = %key,
                callback = %info.callback,
                "Scheduled job executed"
            ),
            Err(e) => error!(
                job = %job_name,
                period_key = %key,
                callback = %info.callback,
                error = %e,
                "Scheduled job callback failed"
            ),
        }

        self.maybe_cleanup().await;
        Ok(FireOutcome::Executed(result))
    }

    /// Delete lock rows older than the retention window.
    pub async fn cleanup_locks(&self) -> AppResult<u64> {
        let removed = self.locks.cleanup(self.retention).await?;
        *self.last_cleanup.lock().await = Some(Utc::now());
        if removed > 0 {
            info!(removed, "Removed expired schedule locks");
        }
        Ok(removed)
    }

    async fn maybe_cleanup(&self) {
        let due = {
            let last = self.last_cleanup.lock().await;
            last.is_none_or(|at| Utc::now() - at >= Duration::minutes(CLEANUP_INTERVAL_MINUTES))
        };
        if !due {
            return;
        }
        if let Err(e) = self.cleanup_locks().await {
            warn!(error = %e, "Schedule lock cleanup failed");
        }
    }

    fn build_job(&self, name: &str, expression: &str) -> AppResult<CronJob> {
        let this = self.this.clone();
        let job_name = name.to_string();
        let schedule = expression.to_string();

        CronJob::new_async(scheduler_expression(expression).as_str(), move |_uuid, _lock| {
            let this = this.clone();
            let job_name = job_name.clone();
            let schedule = schedule.clone();
            Box::pin(async move {
                let Some(coordinator) = this.upgrade() else {
                    return;
                };
                let fire_time = scheduled_fire_time(&schedule, Utc::now());
                if let Err(e) = coordinator.fire(&job_name, fire_time).await {
                    error!(job = %job_name, error = %e, "Scheduled job firing failed");
                }
            })
        })
        .map_err(|e| {
            AppError::validation(format!("Invalid schedule '{expression}' for job '{name}': {e}"))
        })
    }

    async fn remove_scheduled(&self, entry: &JobEntry) -> AppResult<()> {
        if let Some(job_id) = entry.job_id {
            self.scheduler.remove(&job_id).await.map_err(|e| {
                AppError::internal(format!("Failed to remove job '{}': {e}", entry.info.name))
            })?;
        }
        Ok(())
    }

    /// Unprotect `callback` unless another registered job still uses it.
    fn release_callback(&self, jobs: &BTreeMap<String, JobEntry>, callback: &str) {
        let still_used = jobs
            .values()
            .any(|e| e.info.state == JobState::Registered && e.info.callback == callback);
        if !still_used {
            self.dispatcher.policy().unprotect(callback);
        }
    }
}

#[async_trait]
impl SchedulerService for ScheduledJobCoordinator {
    async fn schedule(&self, request: ScheduleRequest) -> Result<ScheduledJobInfo, String> {
        self.register(request).await.map_err(|e| e.to_string())
    }

    async fn cancel(&self, name: &str) -> Result<ScheduledJobInfo, String> {
        ScheduledJobCoordinator::cancel(self, name)
            .await
            .map_err(|e| e.to_string())
    }

    async fn jobs(&self) -> Vec<ScheduledJobInfo> {
        self.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use gamehub_plugin::api::context::HostServices;
    use gamehub_plugin::executor::CallExecutor;
    use gamehub_plugin::hooks::CallPolicy;
    use gamehub_plugin::module::HookModule;
    use gamehub_plugin::traits::FunctionModule;
    use serde_json::Value;

    use crate::lock_store::MemoryScheduleLockStore;

    fn counting_module(counter: Arc<AtomicUsize>) -> Arc<dyn HookModule> {
        FunctionModule::builder("ReportHooks")
            .function("report_job", 1, move |_args: Vec<Value>, _ctx| {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                })
            })
            .into_module()
    }

    async fn dispatcher_with(module: Arc<dyn HookModule>) -> Arc<HookDispatcher> {
        dispatcher_on(module, CallExecutor::default()).await
    }

    async fn dispatcher_on(
        module: Arc<dyn HookModule>,
        executor: CallExecutor,
    ) -> Arc<HookDispatcher> {
        let dispatcher = Arc::new(HookDispatcher::new(
            executor,
            CallPolicy::new(None),
            HostServices::new(None),
        ));
        dispatcher.configure(Some(module)).await;
        dispatcher
    }

    async fn coordinator(
        dispatcher: Arc<HookDispatcher>,
        locks: Arc<dyn ScheduleLockStore>,
    ) -> Arc<ScheduledJobCoordinator> {
        ScheduledJobCoordinator::new(dispatcher, locks, &SchedulerConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_daily_callback_is_protected_from_rpc() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with(counting_module(counter)).await;
        let coordinator =
            coordinator(dispatcher.clone(), Arc::new(MemoryScheduleLockStore::new())).await;

        let info = coordinator
            .daily("report_job", DailyOptions { hour: 9, minute: 0 })
            .await
            .unwrap();
        assert_eq!(info.schedule, "0 9 * * *");
        assert_eq!(info.state, JobState::Registered);

        assert_eq!(coordinator.registered_callbacks().await, vec!["report_job"]);
        let err = dispatcher
            .call("report_job", vec![], Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::NotAllowed(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_each_period_runs_once_across_hosts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let locks: Arc<dyn ScheduleLockStore> = Arc::new(MemoryScheduleLockStore::new());

        let host_a = coordinator(
            dispatcher_with(counting_module(counter.clone())).await,
            locks.clone(),
        )
        .await;
        let host_b = coordinator(
            dispatcher_with(counting_module(counter.clone())).await,
            locks.clone(),
        )
        .await;
        for host in [&host_a, &host_b] {
            host.every_minutes(5, "report_job").await.unwrap();
        }

        let fire_time = Utc.with_ymd_and_hms(2026, 3, 14, 9, 5, 0).unwrap();
        let (a, b) = tokio::join!(
            host_a.fire("report_job", fire_time),
            host_b.fire("report_job", fire_time)
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let executed = outcomes
            .iter()
            .filter(|o| matches!(o, FireOutcome::Executed(Ok(()))))
            .count();
        let contended = outcomes
            .iter()
            .filter(|o| matches!(o, FireOutcome::Contended))
            .count();
        assert_eq!((executed, contended), (1, 1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let next = fire_time + Duration::minutes(5);
        assert!(matches!(
            host_b.fire("report_job", next).await.unwrap(),
            FireOutcome::Executed(Ok(()))
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(locks.list(Some("report_job")).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_stops_firing_and_unprotects() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with(counting_module(counter.clone())).await;
        let coordinator =
            coordinator(dispatcher.clone(), Arc::new(MemoryScheduleLockStore::new())).await;

        coordinator
            .hourly("report_job", HourlyOptions { minute: 15 })
            .await
            .unwrap();
        let info = coordinator.cancel("report_job").await.unwrap();
        assert_eq!(info.state, JobState::Cancelled);

        assert!(coordinator.registered_callbacks().await.is_empty());
        assert!(!dispatcher.policy().is_protected("report_job"));
        assert_eq!(coordinator.list().await[0].state, JobState::Cancelled);

        let outcome = coordinator.fire("report_job", Utc::now()).await.unwrap();
        assert_eq!(outcome, FireOutcome::Inactive);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert!(coordinator.cancel("unknown").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reregistration_replaces_job() {
        let dispatcher = dispatcher_with(counting_module(Arc::new(AtomicUsize::new(0)))).await;
        let coordinator =
            coordinator(dispatcher.clone(), Arc::new(MemoryScheduleLockStore::new())).await;

        coordinator
            .cron("nightly", "0 3 * * *", "report_job")
            .await
            .unwrap();
        coordinator
            .cron("nightly", "30 4 * * *", "compact_job")
            .await
            .unwrap();

        let jobs = coordinator.list().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].schedule, "30 4 * * *");
        assert_eq!(jobs[0].callback, "compact_job");
        assert!(!dispatcher.policy().is_protected("report_job"));
        assert!(dispatcher.policy().is_protected("compact_job"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_schedule_is_rejected() {
        let dispatcher = dispatcher_with(counting_module(Arc::new(AtomicUsize::new(0)))).await;
        let coordinator =
            coordinator(dispatcher.clone(), Arc::new(MemoryScheduleLockStore::new())).await;

        assert!(coordinator.every_minutes(0, "report_job").await.is_err());
        assert!(coordinator.list().await.is_empty());
        assert!(!dispatcher.policy().is_protected("report_job"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_reachable_from_host_services() {
        let dispatcher = dispatcher_with(counting_module(Arc::new(AtomicUsize::new(0)))).await;
        let coordinator =
            coordinator(dispatcher.clone(), Arc::new(MemoryScheduleLockStore::new())).await;

        let service = dispatcher.services().scheduler().unwrap();
        service
            .schedule(ScheduleRequest::daily(
                "report_job",
                DailyOptions { hour: 0, minute: 5 },
            ))
            .await
            .unwrap();
        assert_eq!(coordinator.registered_callbacks().await, vec!["report_job"]);
        assert_eq!(service.jobs().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_saturated_host_leaves_period_unclaimed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_on(
            counting_module(counter.clone()),
            CallExecutor::new(1, std::time::Duration::from_millis(200)),
        )
        .await;
        let locks: Arc<dyn ScheduleLockStore> = Arc::new(MemoryScheduleLockStore::new());
        let coordinator = coordinator(dispatcher.clone(), locks.clone()).await;
        coordinator.every_minutes(5, "report_job").await.unwrap();

        let fire_time = Utc.with_ymd_and_hms(2026, 3, 14, 9, 5, 0).unwrap();
        let busy = dispatcher.reserve_slot("other_job").await.unwrap();
        assert_eq!(
            coordinator.fire("report_job", fire_time).await.unwrap(),
            FireOutcome::Saturated
        );
        assert!(locks.list(Some("report_job")).await.unwrap().is_empty());

        // A slot freed while waiting is picked up and the period runs.
        let release = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            drop(busy);
        });
        assert_eq!(
            coordinator.fire("report_job", fire_time).await.unwrap(),
            FireOutcome::Executed(Ok(()))
        );
        release.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(locks.list(Some("report_job")).await.unwrap().len(), 1);
    }
}
