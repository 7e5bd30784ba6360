//! End-to-end tests against a real ClickHouse.
//!
//! Requires Docker to be running for the ClickHouse testcontainer, or
//! `TRANSITIONS_TEST_CLICKHOUSE_URL` pointing at a server.

use clickhouse_client::rows::{ProjectRow, TrackedEventRow};
use integration_tests::fixtures;
use integration_tests::setup::ClickHouseContext;
use transition_core::{EventCategory, IdentityStore};

async fn seed_events(ctx: &ClickHouseContext, project_id: &str, sessions: &[(&str, &[(&str, i64)])]) {
    let client = ctx.clickhouse.inner();

    let mut insert = client.insert("projects").unwrap();
    insert
        .write(&ProjectRow {
            project_id: project_id.to_string(),
            created_at: fixtures::base_time().timestamp_millis(),
        })
        .await
        .unwrap();
    insert.end().await.unwrap();

    let mut insert = client.insert("tracked_events").unwrap();
    let mut sequence = 0;
    for (session_id, steps) in sessions {
        for (identity_id, offset_ms) in steps.iter() {
            insert
                .write(&TrackedEventRow {
                    project_id: project_id.to_string(),
                    session_id: format!("{}-{}", project_id, session_id),
                    event_identity_id: identity_id.to_string(),
                    timestamp: fixtures::at(*offset_ms).timestamp_millis(),
                    sequence,
                    properties: String::new(),
                })
                .await
                .unwrap();
            sequence += 1;
        }
    }
    insert.end().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_recompute_and_query_round_trip() {
    let ctx = ClickHouseContext::new().await;
    let project = fixtures::unique_project("e2e");

    let a = ctx
        .store
        .get_or_create_identity("page_view:/", EventCategory::PageView)
        .await
        .unwrap();
    let b = ctx
        .store
        .get_or_create_identity("page_view:/pricing", EventCategory::PageView)
        .await
        .unwrap();
    let c = ctx
        .store
        .get_or_create_identity("click:#signup", EventCategory::Click)
        .await
        .unwrap();

    seed_events(
        &ctx,
        &project,
        &[
            ("s1", &[(a.id.as_str(), 0), (b.id.as_str(), 1_000)]),
            ("s2", &[(a.id.as_str(), 0), (b.id.as_str(), 3_000)]),
            ("s3", &[(a.id.as_str(), 0), (a.id.as_str(), 500), (b.id.as_str(), 2_000)]),
            ("s4", &[(a.id.as_str(), 0), (c.id.as_str(), 4_000)]),
        ],
    )
    .await;

    let summary = ctx.engine.compute_transitions_for_project(&project).await.unwrap();
    assert_eq!(summary.sessions, 4);
    assert_eq!(summary.transitions_written, 2);

    let top = ctx
        .engine
        .get_top_transitions_from_event(&project, &a.id, 5)
        .await
        .unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].event.key, "page_view:/pricing");
    assert_eq!(top[0].count, 3);
    assert_eq!(top[0].avg_duration_ms, Some(2000));
    assert!((top[0].percentage - 75.0).abs() < 1e-9);

    // Recompute again: replacing versions must not duplicate rows
    ctx.engine.compute_transitions_for_project(&project).await.unwrap();
    let top = ctx
        .engine
        .get_top_transitions_from_event(&project, &a.id, 5)
        .await
        .unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].count, 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_incremental_update_against_clickhouse() {
    let ctx = ClickHouseContext::new().await;
    let project = fixtures::unique_project("e2e-inc");

    seed_events(&ctx, &project, &[("s1", &[("A", 0), ("B", 1_000)])]).await;
    ctx.engine.compute_transitions_for_project(&project).await.unwrap();

    seed_events(&ctx, &project, &[("s2", &[("A", 0), ("B", 3_000)])]).await;
    let outcome = ctx
        .engine
        .update_transitions_for_session(&format!("{}-s2", project))
        .await
        .unwrap();
    assert!(outcome.is_applied());

    let top = ctx
        .engine
        .get_top_transitions_from_event(&project, "A", 5)
        .await
        .unwrap();
    assert_eq!(top[0].count, 2);
    assert_eq!(top[0].avg_duration_ms, Some(2000));
    assert!(ctx.engine.has_transitions(&project).await.unwrap());
}
