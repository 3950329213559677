//! Context management service.

use crate::error::{Error, Result};
use crate::models::Context;
use crate::services::ServiceContext;

/// Context management service
pub struct ContextService {
    ctx: ServiceContext,
}

impl ContextService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a context. A context with no assignments does not affect any
    /// resolution, so the version counter is left alone.
    pub async fn create(&self, name: &str) -> Result<Context> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "context name must not be empty".to_string(),
            ));
        }

        sqlx::query_as("INSERT INTO role_manager_contexts (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.ctx.db)
            .await
            .map_err(|e| Error::from_db(e, "context name already exists"))
    }

    pub async fn get(&self, id: i64) -> Result<Context> {
        sqlx::query_as("SELECT id, name FROM role_manager_contexts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("context {id} not found")))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Context> {
        sqlx::query_as("SELECT id, name FROM role_manager_contexts WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("context '{name}' not found")))
    }

    pub async fn list(&self) -> Result<Vec<Context>> {
        sqlx::query_as("SELECT id, name FROM role_manager_contexts ORDER BY name")
            .fetch_all(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<Context> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "context name must not be empty".to_string(),
            ));
        }

        let context: Option<Context> = sqlx::query_as(
            "UPDATE role_manager_contexts SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "context name already exists"))?;

        context.ok_or_else(|| Error::NotFound(format!("context {id} not found")))
    }

    /// Delete a context. Refused while any assignment references it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let context = self.get(id).await?;

        let (user_assignments, group_assignments): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM role_manager_user_context_roles WHERE context_id = $1),
                (SELECT COUNT(*) FROM role_manager_group_context_roles WHERE context_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if user_assignments > 0 || group_assignments > 0 {
            return Err(Error::Dependency(format!(
                "context '{}' is still referenced by {user_assignments} user assignment(s) and \
                 {group_assignments} group assignment(s)",
                context.name
            )));
        }

        sqlx::query("DELETE FROM role_manager_contexts WHERE id = $1")
            .bind(id)
            .execute(&self.ctx.db)
            .await
            .map_err(|e| Error::from_db_restrict(e, "context is still referenced"))?;

        Ok(())
    }
}
