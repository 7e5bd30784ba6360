//! Background sweep and session queue behavior.

use std::sync::Arc;
use std::time::Duration;

use aggregator::EngineConfig;
use chrono::Utc;
use integration_tests::fixtures::{self, PROJECT};
use integration_tests::setup::{FaultyContext, TestContext};
use worker::{SessionQueue, TransitionJob, WorkerConfig, WorkerScheduler};

#[tokio::test]
async fn test_sweep_recomputes_every_project() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);
    fixtures::seed_session(&ctx.store, "proj-other", "s-x", &[("A", 0), ("B", 1_000)]);

    let report = TransitionJob::new(ctx.engine.clone(), 4).run().await.unwrap();

    assert_eq!(report.total(), 2);
    assert!(!report.is_partial());
    assert!(ctx.engine.has_transitions(PROJECT).await.unwrap());
    assert!(ctx.engine.has_transitions("proj-other").await.unwrap());
}

#[tokio::test]
async fn test_sweep_reports_failed_projects() {
    let ctx = FaultyContext::new(EngineConfig::default());
    fixtures::fan_out(ctx.memory());
    ctx.store.set_fail_writes(true);

    let report = TransitionJob::new(ctx.engine.clone(), 1).run().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].project_id, PROJECT);
    assert!(report.failed[0].error.contains("STORE_002"));
}

#[tokio::test]
async fn test_session_queue_applies_sessions_in_background() {
    let ctx = TestContext::new();
    for i in 0..5 {
        fixtures::seed_session(
            &ctx.store,
            PROJECT,
            &format!("s-{}", i),
            &[("A", 0), ("B", 2_000)],
        );
    }

    let (queue, handles) = SessionQueue::start(ctx.engine.clone(), 2, 3);
    for i in 0..5 {
        queue.enqueue(format!("s-{}", i)).await.unwrap();
    }
    drop(queue);
    for handle in handles {
        handle.await.unwrap();
    }

    let ab = ctx.transition(PROJECT, "A", "B").unwrap();
    assert_eq!(ab.count, 5);
    assert_eq!(ab.avg_duration_ms, Some(2000));
}

#[tokio::test]
async fn test_scheduler_runs_initial_sweep() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);

    let config = WorkerConfig {
        sweep_interval_secs: 3600,
        ..Default::default()
    };
    let workers = Arc::new(WorkerScheduler::new(config, ctx.engine.clone())).start();

    // The first interval tick fires immediately
    let mut materialized = false;
    for _ in 0..50 {
        if ctx.engine.has_transitions(PROJECT).await.unwrap() {
            materialized = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(materialized);

    workers.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_queued_sessions() {
    let ctx = TestContext::new();
    for i in 0..200 {
        fixtures::seed_session(
            &ctx.store,
            PROJECT,
            &format!("s-{}", i),
            &[("A", 0), ("B", 1_000)],
        );
    }

    let config = WorkerConfig {
        sweep_interval_secs: 0,
        session_poll_interval_secs: 0,
        ..Default::default()
    };
    let workers = Arc::new(WorkerScheduler::new(config, ctx.engine.clone())).start();
    for i in 0..200 {
        workers.queue.enqueue(format!("s-{}", i)).await.unwrap();
    }
    workers.shutdown().await;

    let ab = ctx.transition(PROJECT, "A", "B").unwrap();
    assert_eq!(ab.count, 200);
}

#[tokio::test]
async fn test_scheduler_enqueues_sessions_once_idle() {
    let ctx = TestContext::new();
    let config = WorkerConfig {
        sweep_interval_secs: 0,
        session_poll_interval_secs: 1,
        session_idle_secs: 0,
        ..Default::default()
    };
    let workers = Arc::new(WorkerScheduler::new(config, ctx.engine.clone())).start();

    // Events land after the poller's starting watermark
    let t0 = Utc::now();
    ctx.store.record_event(PROJECT, "s-live", "A", t0);
    ctx.store
        .record_event(PROJECT, "s-live", "B", t0 + chrono::Duration::milliseconds(10));

    let mut applied = None;
    for _ in 0..100 {
        applied = ctx.transition(PROJECT, "A", "B");
        if applied.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    workers.shutdown().await;

    let ab = applied.expect("idle session applied by the poller");
    assert_eq!(ab.count, 1);
    assert_eq!(ab.avg_duration_ms, Some(10));
}
