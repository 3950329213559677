//! Global permissions version counter.
//!
//! A single monotonically non-decreasing integer persisted in the
//! `role_manager_config` table. Cache entries are stamped with the value
//! observed at write time; any structural permission write increments the
//! counter inside its own transaction, implicitly invalidating every
//! stamped entry.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{Error, Result};

pub const PERMISSIONS_VERSION_KEY: &str = "permissions_version";

/// Read the current version.
pub async fn current(pool: &PgPool) -> Result<i64> {
    sqlx::query_scalar("SELECT value FROM role_manager_config WHERE key = $1")
        .bind(PERMISSIONS_VERSION_KEY)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Atomically increment the version inside the caller's transaction and
/// return the new value. Must be called by every write that can change a
/// permission outcome, before the transaction commits.
pub async fn bump(tx: &mut Transaction<'_, Postgres>) -> Result<i64> {
    sqlx::query_scalar(
        "UPDATE role_manager_config SET value = value + 1 WHERE key = $1 RETURNING value",
    )
    .bind(PERMISSIONS_VERSION_KEY)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| Error::Database(e.to_string()))
}
