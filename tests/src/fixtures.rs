//! Test fixtures and session generators.

use chrono::{DateTime, Duration, TimeZone, Utc};

use aggregator::MemoryStore;
use transition_core::EventCategory;

pub const PROJECT: &str = "proj-test";

/// Fixed base time so durations are deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000)
        .single()
        .expect("valid base time")
}

/// Base time plus `offset_ms`.
pub fn at(offset_ms: i64) -> DateTime<Utc> {
    base_time() + Duration::milliseconds(offset_ms)
}

/// Records one session as `(identity id, offset ms)` steps, in order.
pub fn seed_session(store: &MemoryStore, project_id: &str, session_id: &str, steps: &[(&str, i64)]) {
    for (identity_id, offset_ms) in steps {
        store.record_event(project_id, session_id, identity_id, at(*offset_ms));
    }
}

/// Registers page-view identities whose key is `page_view:/<id>`.
pub fn seed_identities(store: &MemoryStore, ids: &[&str]) {
    for id in ids {
        store.insert_identity(id, &page_key(id), EventCategory::PageView);
    }
}

pub fn page_key(id: &str) -> String {
    EventCategory::PageView.key_for(&format!("/{}", id.to_lowercase()))
}

/// Project id unique to this run, for tests against a shared database.
pub fn unique_project(label: &str) -> String {
    format!("{}-{}", label, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// One session `A A B C C B` with repeated clicks, collapsing to `A B C B`.
pub fn double_click_session(store: &MemoryStore) {
    seed_identities(store, &["A", "B", "C"]);
    seed_session(
        store,
        PROJECT,
        "s-a",
        &[
            ("A", 0),
            ("A", 1_000),
            ("B", 2_000),
            ("C", 5_000),
            ("C", 6_000),
            ("B", 9_000),
        ],
    );
}

/// Two sessions each moving `A->B`, after 1s and 3s.
pub fn two_sessions_same_pair(store: &MemoryStore) {
    seed_identities(store, &["A", "B"]);
    seed_session(store, PROJECT, "s-1", &[("A", 0), ("B", 1_000)]);
    seed_session(store, PROJECT, "s-2", &[("A", 0), ("B", 3_000)]);
}

/// Fan-out from `A`: `A->B` x3, `A->C` x1.
pub fn fan_out(store: &MemoryStore) {
    seed_identities(store, &["A", "B", "C"]);
    for i in 0..3 {
        seed_session(store, PROJECT, &format!("s-ab-{}", i), &[("A", 0), ("B", 1_000)]);
    }
    seed_session(store, PROJECT, "s-ac", &[("A", 0), ("C", 2_000)]);
}

/// Two paths converging on `X`: `A->P1->X` x2, `A->P2->X` x3.
pub fn fan_in(store: &MemoryStore) {
    seed_identities(store, &["A", "P1", "P2", "X"]);
    for i in 0..2 {
        seed_session(
            store,
            PROJECT,
            &format!("s-p1-{}", i),
            &[("A", 0), ("P1", 1_000), ("X", 2_000)],
        );
    }
    for i in 0..3 {
        seed_session(
            store,
            PROJECT,
            &format!("s-p2-{}", i),
            &[("A", 0), ("P2", 1_000), ("X", 2_000)],
        );
    }
}
