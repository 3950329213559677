//! Role management service.

use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::error::{Error, Result};
use crate::models::{RightKind, Role, RoleRight};
use crate::services::ServiceContext;

/// A role's grant joined with the right it names.
#[derive(Debug, Clone, FromRow)]
pub struct RoleRightRow {
    pub right_id: i64,
    pub right_name: String,
    pub kind: RightKind,
    pub range_value: Option<Decimal>,
}

/// Role management service
pub struct RoleService {
    ctx: ServiceContext,
}

impl RoleService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, name: &str) -> Result<Role> {
        if name.trim().is_empty() {
            return Err(Error::Validation("role name must not be empty".to_string()));
        }

        let mut tx = self.ctx.db.begin().await?;

        let role: Role =
            sqlx::query_as("INSERT INTO role_manager_roles (name) VALUES ($1) RETURNING id, name")
                .bind(name)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| Error::from_db(e, "role name already exists"))?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(role)
    }

    pub async fn get(&self, id: i64) -> Result<Role> {
        sqlx::query_as("SELECT id, name FROM role_manager_roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("role {id} not found")))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Role> {
        sqlx::query_as("SELECT id, name FROM role_manager_roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("role '{name}' not found")))
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        sqlx::query_as("SELECT id, name FROM role_manager_roles ORDER BY name")
            .fetch_all(&self.ctx.db)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<Role> {
        if name.trim().is_empty() {
            return Err(Error::Validation("role name must not be empty".to_string()));
        }

        let mut tx = self.ctx.db.begin().await?;

        let role: Option<Role> = sqlx::query_as(
            "UPDATE role_manager_roles SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::from_db(e, "role name already exists"))?;

        let role = role.ok_or_else(|| Error::NotFound(format!("role {id} not found")))?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(role)
    }

    /// Delete a role. Refused while any user or group assignment
    /// references it; the role's own grants are removed with it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let role = self.get(id).await?;

        let (user_assignments, group_assignments): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM role_manager_user_context_roles WHERE role_id = $1),
                (SELECT COUNT(*) FROM role_manager_group_context_roles WHERE role_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if user_assignments > 0 || group_assignments > 0 {
            return Err(Error::Dependency(format!(
                "role '{}' is still assigned to {user_assignments} user(s) and \
                 {group_assignments} group(s)",
                role.name
            )));
        }

        let mut tx = self.ctx.db.begin().await?;

        sqlx::query("DELETE FROM role_manager_roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::from_db_restrict(e, "role is still assigned"))?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Grant a right to a role. Range rights take a value inside their
    /// declared bounds; boolean rights take none.
    pub async fn add_right(
        &self,
        role_id: i64,
        right_id: i64,
        value: Option<Decimal>,
    ) -> Result<RoleRight> {
        let value = self.validate_grant_value(right_id, value).await?;

        let mut tx = self.ctx.db.begin().await?;

        let grant: RoleRight = sqlx::query_as(
            r#"
            INSERT INTO role_manager_role_rights (role_id, right_id, range_value)
            VALUES ($1, $2, $3)
            RETURNING role_id, right_id, range_value
            "#,
        )
        .bind(role_id)
        .bind(right_id)
        .bind(value)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                Error::Conflict(format!("role {role_id} already grants right {right_id}"))
            } else if msg.contains("violates foreign key constraint") {
                Error::NotFound("role or right not found".to_string())
            } else {
                Error::Database(msg)
            }
        })?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(grant)
    }

    /// Change the value of an existing range grant.
    pub async fn update_right_value(
        &self,
        role_id: i64,
        right_id: i64,
        value: Option<Decimal>,
    ) -> Result<RoleRight> {
        let value = self.validate_grant_value(right_id, value).await?;

        let mut tx = self.ctx.db.begin().await?;

        let grant: Option<RoleRight> = sqlx::query_as(
            r#"
            UPDATE role_manager_role_rights
            SET range_value = $3
            WHERE role_id = $1 AND right_id = $2
            RETURNING role_id, right_id, range_value
            "#,
        )
        .bind(role_id)
        .bind(right_id)
        .bind(value)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let grant = grant.ok_or_else(|| {
            Error::NotFound(format!("role {role_id} does not grant right {right_id}"))
        })?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(grant)
    }

    /// Revoke a right from a role.
    pub async fn remove_right(&self, role_id: i64, right_id: i64) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        let result = sqlx::query(
            "DELETE FROM role_manager_role_rights WHERE role_id = $1 AND right_id = $2",
        )
        .bind(role_id)
        .bind(right_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "role {role_id} does not grant right {right_id}"
            )));
        }

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// List the rights a role grants.
    pub async fn rights(&self, role_id: i64) -> Result<Vec<RoleRightRow>> {
        sqlx::query_as(
            r#"
            SELECT ri.id AS right_id, ri.name AS right_name, ri.kind, rr.range_value
            FROM role_manager_role_rights rr
            JOIN role_manager_rights ri ON ri.id = rr.right_id
            WHERE rr.role_id = $1
            ORDER BY ri.name
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Check a grant value against the right's kind and declared bounds.
    async fn validate_grant_value(
        &self,
        right_id: i64,
        value: Option<Decimal>,
    ) -> Result<Option<Decimal>> {
        let right: Option<(String, RightKind, Option<Decimal>, Option<Decimal>)> = sqlx::query_as(
            r#"
            SELECT ri.name, ri.kind, rt.min_value, rt.max_value
            FROM role_manager_rights ri
            LEFT JOIN role_manager_righttype_ranges rt ON rt.id = ri.righttype_range_id
            WHERE ri.id = $1
            "#,
        )
        .bind(right_id)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let (name, kind, min_value, max_value) =
            right.ok_or_else(|| Error::NotFound(format!("right {right_id} not found")))?;

        check_grant_value(&name, kind, min_value, max_value, value)
    }
}

/// Pure bounds check behind [`RoleService::add_right`]. A boolean right
/// takes no value; a range right takes exactly one, inside its bounds.
fn check_grant_value(
    right_name: &str,
    kind: RightKind,
    min_value: Option<Decimal>,
    max_value: Option<Decimal>,
    value: Option<Decimal>,
) -> Result<Option<Decimal>> {
    match kind {
        RightKind::Boolean => {
            if value.is_some() {
                return Err(Error::Validation(format!(
                    "boolean right '{right_name}' does not take a value"
                )));
            }
            Ok(None)
        }
        RightKind::Range => {
            let value = value.ok_or_else(|| {
                Error::Validation(format!("range right '{right_name}' requires a value"))
            })?;
            let (min_value, max_value) = match (min_value, max_value) {
                (Some(min), Some(max)) => (min, max),
                _ => {
                    return Err(Error::Internal(format!(
                        "range right '{right_name}' has no bounds"
                    )))
                }
            };
            if value < min_value || value > max_value {
                return Err(Error::Validation(format!(
                    "value {value} is outside the allowed range [{min_value:.2}, {max_value:.2}] \
                     for right '{right_name}'"
                )));
            }
            Ok(Some(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // -----------------------------------------------------------------------
    // Grant value validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_boolean_right_takes_no_value() {
        let ok = check_grant_value("view_article", RightKind::Boolean, None, None, None);
        assert_eq!(ok.unwrap(), None);

        let err = check_grant_value(
            "view_article",
            RightKind::Boolean,
            None,
            None,
            Some(dec!(1.00)),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not take a value"));
    }

    #[test]
    fn test_range_right_requires_value() {
        let err = check_grant_value(
            "approve_budget",
            RightKind::Range,
            Some(dec!(0.00)),
            Some(dec!(10000.00)),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a value"));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        for value in [dec!(0.00), dec!(10000.00), dec!(2500.00)] {
            let ok = check_grant_value(
                "approve_budget",
                RightKind::Range,
                Some(dec!(0.00)),
                Some(dec!(10000.00)),
                Some(value),
            );
            assert_eq!(ok.unwrap(), Some(value));
        }
    }

    #[test]
    fn test_range_epsilon_outside_bounds_rejected() {
        for value in [dec!(-0.01), dec!(10000.01)] {
            let result = check_grant_value(
                "approve_budget",
                RightKind::Range,
                Some(dec!(0.00)),
                Some(dec!(10000.00)),
                Some(value),
            );
            assert!(result.is_err(), "should reject {value}");
        }
    }

    #[test]
    fn test_range_violation_names_value_and_bounds() {
        let err = check_grant_value(
            "approve_budget",
            RightKind::Range,
            Some(dec!(0.00)),
            Some(dec!(10000.00)),
            Some(dec!(10000.01)),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: value 10000.01 is outside the allowed range [0.00, 10000.00] \
             for right 'approve_budget'"
        );
    }
}
