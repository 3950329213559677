//! Group model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Group entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
