//! ClickHouse health checks and schema bootstrap.

use crate::client::ClickHouseClient;
use tracing::{debug, error};
use transition_core::{Error, Result};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.bootstrap().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    use crate::schema::all_tables;

    let bootstrap = client.bootstrap();
    for ddl in all_tables(&client.config().database) {
        bootstrap
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| Error::write_failed(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!(database = %client.config().database, "ClickHouse schema initialized");
    Ok(())
}
