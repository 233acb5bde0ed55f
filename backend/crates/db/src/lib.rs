pub mod records;
pub mod schema;
pub mod sync;

use hubsync_common::error::{HubsyncError, HubsyncResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> HubsyncResult<PgPool> {
    tracing::info!(max_connections, "connecting to database");
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(database_url)
        .await
        .map_err(HubsyncError::database)
}
