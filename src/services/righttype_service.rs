//! Right-type range management service.

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::models::RightTypeRange;
use crate::services::ServiceContext;

/// Right-type range management service
pub struct RightTypeService {
    ctx: ServiceContext,
}

impl RightTypeService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, name: &str, min_value: Decimal, max_value: Decimal) -> Result<RightTypeRange> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "right-type name must not be empty".to_string(),
            ));
        }
        validate_bounds(min_value, max_value)?;

        sqlx::query_as(
            r#"
            INSERT INTO role_manager_righttype_ranges (name, min_value, max_value)
            VALUES ($1, $2, $3)
            RETURNING id, name, min_value, max_value
            "#,
        )
        .bind(name)
        .bind(min_value)
        .bind(max_value)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "right-type name already exists"))
    }

    pub async fn get(&self, id: i64) -> Result<RightTypeRange> {
        sqlx::query_as(
            "SELECT id, name, min_value, max_value FROM role_manager_righttype_ranges WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("right-type range {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<RightTypeRange>> {
        sqlx::query_as(
            "SELECT id, name, min_value, max_value FROM role_manager_righttype_ranges ORDER BY name",
        )
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Update a range. Stored role-right values are kept verbatim, so
    /// adjusting the bounds does not touch the version counter.
    pub async fn update(&self, id: i64, name: &str, min_value: Decimal, max_value: Decimal) -> Result<RightTypeRange> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "right-type name must not be empty".to_string(),
            ));
        }
        validate_bounds(min_value, max_value)?;

        let range: Option<RightTypeRange> = sqlx::query_as(
            r#"
            UPDATE role_manager_righttype_ranges
            SET name = $2, min_value = $3, max_value = $4
            WHERE id = $1
            RETURNING id, name, min_value, max_value
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(min_value)
        .bind(max_value)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "right-type name already exists"))?;

        range.ok_or_else(|| Error::NotFound(format!("right-type range {id} not found")))
    }

    /// Delete a range. Refused while any right references it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let range = self.get(id).await?;

        let rights: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM role_manager_rights WHERE righttype_range_id = $1",
        )
        .bind(id)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        if rights > 0 {
            return Err(Error::Dependency(format!(
                "right-type range '{}' is still referenced by {rights} right(s)",
                range.name
            )));
        }

        sqlx::query("DELETE FROM role_manager_righttype_ranges WHERE id = $1")
            .bind(id)
            .execute(&self.ctx.db)
            .await
            .map_err(|e| Error::from_db_restrict(e, "right-type range is still referenced"))?;

        Ok(())
    }
}

fn validate_bounds(min_value: Decimal, max_value: Decimal) -> Result<()> {
    if min_value > max_value {
        return Err(Error::Validation(format!(
            "range minimum {min_value:.2} exceeds maximum {max_value:.2}"
        )));
    }
    Ok(())
}
