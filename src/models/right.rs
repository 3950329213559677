//! Right, right-group and right-type-range models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Right kind enum. Stored as plain text, not a native Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RightKind {
    Boolean,
    Range,
}

/// Right entity. `righttype_range_id` is set iff `kind` is `Range`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Right {
    pub id: i64,
    pub name: String,
    pub rightgroup_id: i64,
    pub kind: RightKind,
    pub righttype_range_id: Option<i64>,
}

/// Right-group entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RightGroup {
    pub id: i64,
    pub name: String,
}

/// Named numeric scale for range rights
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RightTypeRange {
    pub id: i64,
    pub name: String,
    pub min_value: Decimal,
    pub max_value: Decimal,
}
