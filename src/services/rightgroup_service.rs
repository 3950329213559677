//! Right-group management service.

use crate::error::{Error, Result};
use crate::models::RightGroup;
use crate::services::ServiceContext;

/// Right-group management service
pub struct RightGroupService {
    ctx: ServiceContext,
}

impl RightGroupService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, name: &str) -> Result<RightGroup> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "right-group name must not be empty".to_string(),
            ));
        }

        sqlx::query_as(
            "INSERT INTO role_manager_rightgroups (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "right-group name already exists"))
    }

    pub async fn get(&self, id: i64) -> Result<RightGroup> {
        sqlx::query_as("SELECT id, name FROM role_manager_rightgroups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("right-group {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<RightGroup>> {
        sqlx::query_as("SELECT id, name FROM role_manager_rightgroups ORDER BY name")
            .fetch_all(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<RightGroup> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "right-group name must not be empty".to_string(),
            ));
        }

        let group: Option<RightGroup> = sqlx::query_as(
            "UPDATE role_manager_rightgroups SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "right-group name already exists"))?;

        group.ok_or_else(|| Error::NotFound(format!("right-group {id} not found")))
    }

    /// Delete a right-group. Refused while any right references it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let group = self.get(id).await?;

        let rights: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM role_manager_rights WHERE rightgroup_id = $1")
                .bind(id)
                .fetch_one(&self.ctx.db)
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        if rights > 0 {
            return Err(Error::Dependency(format!(
                "right-group '{}' is still referenced by {rights} right(s)",
                group.name
            )));
        }

        sqlx::query("DELETE FROM role_manager_rightgroups WHERE id = $1")
            .bind(id)
            .execute(&self.ctx.db)
            .await
            .map_err(|e| Error::from_db_restrict(e, "right-group is still referenced"))?;

        Ok(())
    }
}
