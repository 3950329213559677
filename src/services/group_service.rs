//! Group management service, including the subgroup hierarchy.

use serde::Deserialize;

use crate::authz::closure::descendant_groups;
use crate::error::{Error, Result};
use crate::models::{Group, User};
use crate::services::ServiceContext;

/// Advisory lock id serializing subgroup-edge writes. The cycle check and
/// the insert must not interleave with a concurrent edge write.
const SUBGROUP_WRITE_LOCK: i64 = 0x524d_5347_5250;

const GROUP_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Group management service
pub struct GroupService {
    ctx: ServiceContext,
}

impl GroupService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a group. A group with no members, edges or assignments does
    /// not affect any resolution, so the version counter is left alone.
    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Group> {
        if name.trim().is_empty() {
            return Err(Error::Validation("group name must not be empty".to_string()));
        }

        sqlx::query_as(&format!(
            r#"
            INSERT INTO role_manager_groups (name, description)
            VALUES ($1, $2)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "group name already exists"))
    }

    pub async fn get(&self, id: i64) -> Result<Group> {
        sqlx::query_as(&format!(
            "SELECT {GROUP_COLUMNS} FROM role_manager_groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("group {id} not found")))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Group> {
        sqlx::query_as(&format!(
            "SELECT {GROUP_COLUMNS} FROM role_manager_groups WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("group '{name}' not found")))
    }

    pub async fn list(&self) -> Result<Vec<Group>> {
        sqlx::query_as(&format!(
            "SELECT {GROUP_COLUMNS} FROM role_manager_groups ORDER BY name"
        ))
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn update(&self, id: i64, request: UpdateGroup) -> Result<Group> {
        if let Some(name) = &request.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("group name must not be empty".to_string()));
            }
        }

        let group: Option<Group> = sqlx::query_as(&format!(
            r#"
            UPDATE role_manager_groups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "group name already exists"))?;

        group.ok_or_else(|| Error::NotFound(format!("group {id} not found")))
    }

    /// Delete a group. Refused while it has members, subgroup edges in
    /// either direction, or role assignments.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let group = self.get(id).await?;

        let (members, edges, assignments): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM role_manager_user_groups WHERE group_id = $1),
                (SELECT COUNT(*) FROM role_manager_group_subgroups
                 WHERE parent_group_id = $1 OR child_group_id = $1),
                (SELECT COUNT(*) FROM role_manager_group_context_roles WHERE group_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if members > 0 || edges > 0 || assignments > 0 {
            return Err(Error::Dependency(format!(
                "group '{}' is still referenced: {members} member(s), {edges} subgroup edge(s), \
                 {assignments} role assignment(s)",
                group.name
            )));
        }

        sqlx::query("DELETE FROM role_manager_groups WHERE id = $1")
            .bind(id)
            .execute(&self.ctx.db)
            .await
            .map_err(|e| Error::from_db_restrict(e, "group is still referenced"))?;

        self.ctx
            .logger
            .info(&format!("Deleted group '{}'", group.name))
            .await;
        Ok(())
    }

    pub async fn members(&self, group_id: i64) -> Result<Vec<User>> {
        sqlx::query_as(
            r#"
            SELECT u.id, u.login, u.email, u.password_hash, u.first_name, u.last_name,
                   u.created_at, u.updated_at
            FROM role_manager_users u
            JOIN role_manager_user_groups ug ON ug.user_id = u.id
            WHERE ug.group_id = $1
            ORDER BY u.login
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn subgroups(&self, group_id: i64) -> Result<Vec<Group>> {
        sqlx::query_as(
            r#"
            SELECT g.id, g.name, g.description, g.created_at, g.updated_at
            FROM role_manager_groups g
            JOIN role_manager_group_subgroups gs ON gs.child_group_id = g.id
            WHERE gs.parent_group_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Insert a subgroup edge. Self-edges and edges that would close a
    /// cycle are refused; the check and the insert run under an advisory
    /// lock so concurrent edge writers serialize.
    pub async fn add_subgroup(&self, parent_id: i64, child_id: i64) -> Result<()> {
        if parent_id == child_id {
            return Err(Error::Validation(format!(
                "group {parent_id} cannot be its own subgroup"
            )));
        }

        let mut tx = self.ctx.db.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SUBGROUP_WRITE_LOCK)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        // The edge parent -> child closes a cycle iff parent is already a
        // descendant of child.
        let descendants = descendant_groups(&mut *tx, child_id).await?;
        if descendants.contains(&parent_id) {
            return Err(Error::Validation(format!(
                "adding group {child_id} as a subgroup of group {parent_id} would create a cycle"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO role_manager_group_subgroups (parent_group_id, child_group_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                Error::Conflict(format!(
                    "group {child_id} is already a subgroup of group {parent_id}"
                ))
            } else if msg.contains("violates foreign key constraint") {
                Error::NotFound(format!("group {parent_id} or group {child_id} not found"))
            } else {
                Error::Database(msg)
            }
        })?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a subgroup edge.
    pub async fn remove_subgroup(&self, parent_id: i64, child_id: i64) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM role_manager_group_subgroups
            WHERE parent_group_id = $1 AND child_group_id = $2
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "group {child_id} is not a subgroup of group {parent_id}"
            )));
        }

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Assign a role to the group in a context (`None` = Global Context).
    pub async fn assign_role(
        &self,
        group_id: i64,
        context_id: Option<i64>,
        role_id: i64,
    ) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO role_manager_group_context_roles (group_id, context_id, role_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(group_id)
        .bind(context_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                Error::Conflict(format!(
                    "role {role_id} is already assigned to group {group_id} in this context"
                ))
            } else if msg.contains("violates foreign key constraint") {
                Error::NotFound("group, context or role not found".to_string())
            } else {
                Error::Database(msg)
            }
        })?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Revoke a role from the group in a context (`None` = Global Context).
    pub async fn revoke_role(
        &self,
        group_id: i64,
        context_id: Option<i64>,
        role_id: i64,
    ) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM role_manager_group_context_roles
            WHERE group_id = $1 AND context_id IS NOT DISTINCT FROM $2 AND role_id = $3
            "#,
        )
        .bind(group_id)
        .bind(context_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "role {role_id} is not assigned to group {group_id} in this context"
            )));
        }

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_group_partial_deserialize() {
        let request: UpdateGroup = serde_json::from_str(r#"{"description": "copy desk"}"#).unwrap();
        assert!(request.name.is_none());
        assert_eq!(request.description.as_deref(), Some("copy desk"));
    }

    #[test]
    fn test_update_group_rejects_unknown_fields() {
        assert!(serde_json::from_str::<UpdateGroup>(r#"{"parent": 3}"#).is_err());
    }
}
