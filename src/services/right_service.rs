//! Right management service.

use crate::error::{Error, Result};
use crate::models::{Right, RightKind};
use crate::services::ServiceContext;

const RIGHT_COLUMNS: &str = "id, name, rightgroup_id, kind, righttype_range_id";

/// Right management service
pub struct RightService {
    ctx: ServiceContext,
}

impl RightService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a right. A right that no role grants yet does not affect any
    /// resolution, so the version counter is left alone.
    pub async fn create(
        &self,
        name: &str,
        rightgroup_id: i64,
        kind: RightKind,
        righttype_range_id: Option<i64>,
    ) -> Result<Right> {
        if name.trim().is_empty() {
            return Err(Error::Validation("right name must not be empty".to_string()));
        }
        validate_range_link(name, kind, righttype_range_id)?;

        sqlx::query_as(&format!(
            r#"
            INSERT INTO role_manager_rights (name, rightgroup_id, kind, righttype_range_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {RIGHT_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(rightgroup_id)
        .bind(kind)
        .bind(righttype_range_id)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                Error::Conflict("right name already exists".to_string())
            } else if msg.contains("violates foreign key constraint") {
                Error::NotFound("right-group or right-type range not found".to_string())
            } else {
                Error::Database(msg)
            }
        })
    }

    pub async fn get(&self, id: i64) -> Result<Right> {
        sqlx::query_as(&format!(
            "SELECT {RIGHT_COLUMNS} FROM role_manager_rights WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("right {id} not found")))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Right> {
        sqlx::query_as(&format!(
            "SELECT {RIGHT_COLUMNS} FROM role_manager_rights WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("right '{name}' not found")))
    }

    pub async fn list(&self) -> Result<Vec<Right>> {
        sqlx::query_as(&format!(
            "SELECT {RIGHT_COLUMNS} FROM role_manager_rights ORDER BY name"
        ))
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Update a right. A right can be renamed or re-typed while roles grant
    /// it, so this changes permission outcomes.
    pub async fn update(
        &self,
        id: i64,
        name: &str,
        rightgroup_id: i64,
        kind: RightKind,
        righttype_range_id: Option<i64>,
    ) -> Result<Right> {
        if name.trim().is_empty() {
            return Err(Error::Validation("right name must not be empty".to_string()));
        }
        validate_range_link(name, kind, righttype_range_id)?;

        let mut tx = self.ctx.db.begin().await?;

        let right: Option<Right> = sqlx::query_as(&format!(
            r#"
            UPDATE role_manager_rights
            SET name = $2, rightgroup_id = $3, kind = $4, righttype_range_id = $5
            WHERE id = $1
            RETURNING {RIGHT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(rightgroup_id)
        .bind(kind)
        .bind(righttype_range_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::from_db(e, "right name already exists"))?;

        let right = right.ok_or_else(|| Error::NotFound(format!("right {id} not found")))?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(right)
    }

    /// Delete a right. Refused while any role grants it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let right = self.get(id).await?;

        let grants: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM role_manager_role_rights WHERE right_id = $1")
                .bind(id)
                .fetch_one(&self.ctx.db)
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        if grants > 0 {
            return Err(Error::Dependency(format!(
                "right '{}' is still granted by {grants} role(s)",
                right.name
            )));
        }

        let mut tx = self.ctx.db.begin().await?;

        sqlx::query("DELETE FROM role_manager_rights WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::from_db_restrict(e, "right is still granted by roles"))?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// A range right must carry a range link; a boolean right must not.
fn validate_range_link(
    name: &str,
    kind: RightKind,
    righttype_range_id: Option<i64>,
) -> Result<()> {
    match (kind, righttype_range_id) {
        (RightKind::Range, None) => Err(Error::Validation(format!(
            "range right '{name}' requires a right-type range"
        ))),
        (RightKind::Boolean, Some(_)) => Err(Error::Validation(format!(
            "boolean right '{name}' cannot reference a right-type range"
        ))),
        _ => Ok(()),
    }
}
