//! Context model.

use serde::Serialize;
use sqlx::FromRow;

/// Named scope within which role assignments are evaluated. The null
/// context (no row) is the Global Context.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Context {
    pub id: i64,
    pub name: String,
}
