//! Database connection pool setup.

use crate::error::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create a connection pool sized for an embedded authorization engine.
/// Every query here is a short point lookup or a small transactional
/// write, so a low warm floor is enough, and the ceiling keeps
/// permission-check bursts from starving the host application's own pool
/// against the same database. Callers with different needs can build
/// their own pool and hand it to [`crate::RoleManager`] directly.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Apply the bundled schema (`rolemanager-create.sql`) to the pool's
/// database. Idempotent; safe to call on every start.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(crate::SCHEMA_SQL).execute(pool).await?;
    Ok(())
}
