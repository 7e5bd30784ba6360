//! Common test setup functions.

use std::sync::Arc;

use aggregator::{EngineConfig, MemoryStore, TransitionEngine};
use clickhouse_client::{health::init_schema, ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use transition_core::{Transition, TransitionKey};

use crate::containers::TestContainers;
use crate::mocks::FaultyStore;

/// Engine wired to an in-memory store.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub engine: TransitionEngine,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        telemetry::init_tracing_from_env();
        let store = Arc::new(MemoryStore::new());
        let engine = TransitionEngine::new(store.clone(), store.clone(), store.clone(), config);
        Self { store, engine }
    }

    /// Reads one persisted transition row.
    pub fn transition(&self, project_id: &str, from: &str, to: &str) -> Option<Transition> {
        let key = TransitionKey::new(project_id, from, to);
        self.store
            .transitions_snapshot(project_id)
            .into_iter()
            .find(|t| t.key() == key)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine wired to a `FaultyStore` for error-path tests.
pub struct FaultyContext {
    pub store: FaultyStore,
    pub engine: TransitionEngine,
}

impl FaultyContext {
    pub fn new(config: EngineConfig) -> Self {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        let shared = Arc::new(store.clone());
        let engine = TransitionEngine::new(shared.clone(), shared.clone(), shared, config);
        Self { store, engine }
    }

    pub fn memory(&self) -> &MemoryStore {
        self.store.inner()
    }
}

/// Engine wired to a real ClickHouse testcontainer.
pub struct ClickHouseContext {
    pub containers: TestContainers,
    pub clickhouse: Arc<ClickHouseClient>,
    pub store: Arc<ClickHouseStore>,
    pub engine: TransitionEngine,
}

impl ClickHouseContext {
    pub async fn new() -> Self {
        let containers = TestContainers::start().await;

        let ch_config = ClickHouseConfig {
            url: containers.clickhouse_url.clone(),
            database: containers.clickhouse_database.clone(),
            username: containers.clickhouse_username.clone(),
            password: containers.clickhouse_password.clone(),
            timeout_secs: 30,
        };
        let clickhouse =
            Arc::new(ClickHouseClient::new(ch_config).expect("Failed to create ClickHouse client"));

        init_schema(&clickhouse)
            .await
            .expect("Failed to initialize schema");

        let store = Arc::new(ClickHouseStore::new(clickhouse.clone()));
        let engine = TransitionEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            EngineConfig::default(),
        );

        Self {
            containers,
            clickhouse,
            store,
            engine,
        }
    }
}
