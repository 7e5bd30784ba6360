//! ClickHouse table schemas.
//!
//! - `projects` and `tracked_events` are written by ingestion and only read here
//! - `event_identities` and `transitions` are owned by the engine
//! - Engine-owned tables use ReplacingMergeTree; reads go through `FINAL`
//!   so the newest version of each key wins
//! - Timestamps are DateTime64(3), bound as epoch milliseconds

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// Projects known to ingestion.
pub fn create_projects_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {db}.projects (
    project_id String,
    created_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(created_at)
ORDER BY project_id
"#,
        db = database
    )
}

/// Raw tracked events, one row per occurrence.
///
/// `sequence` is the insertion order within the session and orders events
/// that share a timestamp.
pub fn create_tracked_events_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {db}.tracked_events (
    project_id String,
    session_id String,
    event_identity_id String,
    timestamp DateTime64(3),
    sequence UInt64,
    properties String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (project_id, session_id, timestamp, sequence)
SETTINGS index_granularity = 8192
"#,
        db = database
    )
}

/// Deduplicated event identities. Ids are derived from keys.
pub fn create_event_identities_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {db}.event_identities (
    id String,
    key String,
    category LowCardinality(String),
    created_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(created_at)
ORDER BY id
"#,
        db = database
    )
}

/// Aggregated transitions, versioned by `updated_at`.
pub fn create_transitions_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {db}.transitions (
    project_id String,
    from_event_identity_id String,
    to_event_identity_id String,
    count UInt64,
    percentage Float64,
    avg_duration_ms Nullable(Int64),
    updated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (project_id, from_event_identity_id, to_event_identity_id)
"#,
        db = database
    )
}

/// All creation statements, database first.
pub fn all_tables(database: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_projects_table(database),
        create_tracked_events_table(database),
        create_event_identities_table(database),
        create_transitions_table(database),
    ]
}
