//! Transition graph traversal against the in-memory store.

use aggregator::EngineConfig;
use integration_tests::fixtures::{self, PROJECT};
use integration_tests::setup::TestContext;
use transition_core::{Direction, GraphOptions};

fn forward(top_n: usize, depth: u32) -> GraphOptions {
    GraphOptions::new(Direction::Forward, top_n, depth)
}

#[tokio::test]
async fn test_fan_in_merges_counts_from_every_parent() {
    let ctx = TestContext::new();
    fixtures::fan_in(&ctx.store);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(5, 2))
        .await
        .unwrap();

    let anchor = graph.node("A").unwrap();
    assert_eq!(anchor.level, 0);
    assert_eq!(anchor.count, 5);

    let level_one: Vec<(&str, u64)> = graph
        .nodes_at_level(1)
        .map(|n| (n.id.as_str(), n.count))
        .collect();
    assert_eq!(level_one, vec![("P2", 3), ("P1", 2)]);

    let x = graph.node("X").unwrap();
    assert_eq!(x.level, 2);
    assert_eq!(x.count, 5);

    let mut into_x: Vec<(&str, u64)> = graph
        .edges_into("X")
        .map(|e| (e.from.as_str(), e.count))
        .collect();
    into_x.sort();
    assert_eq!(into_x, vec![("P1", 2), ("P2", 3)]);
    assert_eq!(graph.max_level(), 2);
}

#[tokio::test]
async fn test_depth_bounds_the_traversal() {
    let ctx = TestContext::new();
    fixtures::fan_in(&ctx.store);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(5, 1))
        .await
        .unwrap();

    assert_eq!(graph.max_level(), 1);
    assert!(graph.node("X").is_none());
    assert_eq!(graph.edges.len(), 2);
}

#[tokio::test]
async fn test_truncated_parent_gets_aggregate_node() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(1, 1))
        .await
        .unwrap();

    let more = graph.node("more:A").unwrap();
    assert!(more.is_aggregate);
    assert_eq!(more.key, "+1 more");
    assert_eq!(more.count, 1);
    assert_eq!(more.level, 1);

    let edge = graph.edges.iter().find(|e| e.to == "more:A").unwrap();
    assert!(edge.is_aggregate);
    assert_eq!(edge.from, "A");
    assert_eq!(edge.avg_duration_ms, None);
    assert!((edge.percentage - 25.0).abs() < 1e-9);

    assert!(graph.node("B").is_some());
    assert!(graph.node("C").is_none());
}

#[tokio::test]
async fn test_cycles_do_not_revisit_nodes() {
    let ctx = TestContext::new();
    fixtures::seed_identities(&ctx.store, &["A", "B"]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-1", &[("A", 0), ("B", 1_000), ("A", 2_000)]);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(5, 5))
        .await
        .unwrap();

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.node("A").unwrap().level, 0);
    assert_eq!(graph.node("B").unwrap().level, 1);

    // The back edge is kept even though A is not placed again
    assert!(graph.edges.iter().any(|e| e.from == "B" && e.to == "A"));
    assert_eq!(graph.max_level(), 1);
}

#[tokio::test]
async fn test_forward_nodes_report_exits() {
    let ctx = TestContext::new();
    fixtures::seed_identities(&ctx.store, &["A", "B", "X"]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-1", &[("A", 0), ("B", 1_000), ("X", 2_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-2", &[("A", 0), ("B", 1_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-3", &[("A", 0), ("B", 1_000)]);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(5, 2))
        .await
        .unwrap();

    let b = graph.node("B").unwrap();
    assert_eq!(b.count, 3);
    assert_eq!(b.exits, Some(2));
    assert_eq!(graph.node("A").unwrap().exits, None);
}

#[tokio::test]
async fn test_level_keeps_top_n_merged_targets() {
    let ctx = TestContext::new();
    fixtures::seed_identities(&ctx.store, &["A", "B", "C", "X", "Y", "Z"]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-1", &[("A", 0), ("B", 1_000), ("X", 2_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-2", &[("A", 0), ("B", 1_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-3", &[("A", 0), ("C", 1_000), ("Y", 2_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-4", &[("A", 0), ("C", 1_000), ("Z", 2_000)]);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(2, 2))
        .await
        .unwrap();

    // X, Y, Z all have count 1; ties break by key
    let level_two: Vec<&str> = graph.nodes_at_level(2).map(|n| n.id.as_str()).collect();
    assert_eq!(level_two, vec!["X", "Y"]);
    assert!(graph.node("Z").is_none());
}

#[tokio::test]
async fn test_backward_edges_follow_the_user_path() {
    let ctx = TestContext::new();
    fixtures::seed_identities(&ctx.store, &["A", "B", "C"]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-1", &[("A", 0), ("C", 1_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-2", &[("B", 0), ("C", 1_000)]);
    fixtures::seed_session(&ctx.store, PROJECT, "s-3", &[("B", 0), ("C", 1_000)]);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "C", GraphOptions::new(Direction::Backward, 5, 1))
        .await
        .unwrap();

    assert_eq!(graph.direction, Direction::Backward);
    assert_eq!(graph.node("C").unwrap().count, 3);

    let mut edges: Vec<(&str, &str, u64)> = graph
        .edges
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str(), e.count))
        .collect();
    edges.sort();
    assert_eq!(edges, vec![("A", "C", 1), ("B", "C", 2)]);
    assert!(graph.nodes.iter().all(|n| n.exits.is_none()));
}

#[tokio::test]
async fn test_graph_materializes_missing_transitions() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);
    assert!(!ctx.engine.has_transitions(PROJECT).await.unwrap());

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(5, 1))
        .await
        .unwrap();

    assert!(ctx.engine.has_transitions(PROJECT).await.unwrap());
    assert_eq!(graph.nodes_at_level(1).count(), 2);
}

#[tokio::test]
async fn test_graph_without_materialization_is_anchor_only() {
    let ctx = TestContext::with_config(EngineConfig {
        auto_materialize: false,
        ..Default::default()
    });
    fixtures::fan_out(&ctx.store);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(5, 3))
        .await
        .unwrap();

    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.edges.is_empty());
    assert_eq!(graph.anchor.key, fixtures::page_key("A"));
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);

    for options in [forward(0, 1), forward(21, 1), forward(5, 0), forward(5, 6)] {
        let err = ctx
            .engine
            .build_transition_graph(PROJECT, "A", options)
            .await
            .unwrap_err();
        assert!(matches!(err, transition_core::Error::Validation(_)));
    }
}

#[tokio::test]
async fn test_unknown_anchor_is_not_found() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);

    let err = ctx
        .engine
        .build_transition_graph(PROJECT, "missing", forward(5, 1))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NOTFOUND_003"));
}

#[tokio::test]
async fn test_graph_serializes_camel_case() {
    let ctx = TestContext::new();
    fixtures::fan_out(&ctx.store);

    let graph = ctx
        .engine
        .build_transition_graph(PROJECT, "A", forward(1, 1))
        .await
        .unwrap();
    let json = serde_json::to_value(&graph).unwrap();

    assert_eq!(json["direction"], "forward");
    assert_eq!(json["anchor"]["id"], "A");
    let aggregate = json["edges"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["isAggregate"] == true)
        .unwrap();
    assert!(aggregate["avgDurationMs"].is_null());
}
