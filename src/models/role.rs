//! Role models.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Role entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// Right granted by a role. `range_value` is present iff the right's kind
/// is `range`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoleRight {
    pub role_id: i64,
    pub right_id: i64,
    pub range_value: Option<Decimal>,
}
