//! Scheduled job lock protocol across hosts.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use gamehub_core::traits::schedule_lock::ScheduleLockStore;
use gamehub_plugin::api::schedule::{DailyOptions, JobState};
use gamehub_worker::{FireOutcome, MemoryScheduleLockStore};

use crate::helpers::TestRuntime;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_host_runs_each_period() {
    let locks: Arc<dyn ScheduleLockStore> = Arc::new(MemoryScheduleLockStore::new());
    let host_a = TestRuntime::with_locks(Arc::clone(&locks)).await;
    let host_b = TestRuntime::with_locks(Arc::clone(&locks)).await;
    for host in [&host_a, &host_b] {
        host.install_sample();
        host.manager.reload().await;
    }

    let job = sample::hooks::DAILY_REWARDS;
    let fire_time = Utc.with_ymd_and_hms(2026, 5, 1, 0, 5, 0).unwrap();
    let (a, b) = tokio::join!(
        host_a.coordinator.fire(job, fire_time),
        host_b.coordinator.fire(job, fire_time)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, FireOutcome::Executed(Ok(()))))
            .count(),
        1
    );
    assert!(outcomes.contains(&FireOutcome::Contended));

    let rows = locks.list(Some(job)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].period_key, "2026-05-01T00:05Z");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_job_stops_firing() {
    let rt = TestRuntime::new().await;
    rt.coordinator
        .daily("report_job", DailyOptions { hour: 9, minute: 0 })
        .await
        .unwrap();

    let info = rt.coordinator.cancel("report_job").await.unwrap();
    assert_eq!(info.state, JobState::Cancelled);
    assert_eq!(
        rt.coordinator.fire("report_job", Utc::now()).await.unwrap(),
        FireOutcome::Inactive
    );
    assert!(rt.locks.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cleanup_keeps_retention_window() {
    let locks = MemoryScheduleLockStore::new();
    let now = Utc::now();
    for (job, age) in [("a", 10), ("b", 8), ("c", 3), ("d", 0)] {
        locks
            .try_acquire(job, "2026-05-01T00:05Z", now - Duration::days(age))
            .await
            .unwrap();
    }

    assert_eq!(locks.cleanup(Duration::days(7)).await.unwrap(), 2);
    let mut remaining: Vec<String> = locks
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.job_name)
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["c", "d"]);
}
