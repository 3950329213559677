//! User management service.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::User;
use crate::services::auth_service::AuthService;
use crate::services::ServiceContext;

const USER_COLUMNS: &str =
    "id, login, email, password_hash, first_name, last_name, created_at, updated_at";

/// Registration request
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

redacted_debug!(NewUser {
    show login,
    show email,
    redact password,
    show first_name,
    show last_name,
});

/// Partial administrative update. Absent fields are left untouched.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

redacted_debug!(UpdateUser {
    show email,
    redact_option password,
    show first_name,
    show last_name,
});

/// User management service
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a new user.
    pub async fn register(&self, request: NewUser) -> Result<User> {
        validate_login(&request.login)?;
        validate_email(&request.email)?;
        if request.password.is_empty() {
            return Err(Error::Validation("password must not be empty".to_string()));
        }

        let password_hash = AuthService::hash_password(&request.password)?;

        let user: User = sqlx::query_as(&format!(
            r#"
            INSERT INTO role_manager_users (login, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&request.login)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                if msg.contains("login") {
                    Error::Conflict("login already exists".to_string())
                } else if msg.contains("email") {
                    Error::Conflict("email already exists".to_string())
                } else {
                    Error::Conflict("user already exists".to_string())
                }
            } else {
                Error::Database(msg)
            }
        })?;

        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM role_manager_users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("user {id} not found")))
    }

    pub async fn get_by_login(&self, login: &str) -> Result<User> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM role_manager_users WHERE login = $1"
        ))
        .bind(login)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(format!("user '{login}' not found")))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM role_manager_users ORDER BY login"
        ))
        .fetch_all(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Administrative partial update. Does not touch the permission
    /// structure, so the version counter is left alone.
    pub async fn update(&self, id: i64, request: UpdateUser) -> Result<User> {
        if let Some(email) = &request.email {
            validate_email(email)?;
        }
        let password_hash = match &request.password {
            Some(password) if password.is_empty() => {
                return Err(Error::Validation("password must not be empty".to_string()))
            }
            Some(password) => Some(AuthService::hash_password(password)?),
            None => None,
        };

        let user: Option<User> = sqlx::query_as(&format!(
            r#"
            UPDATE role_manager_users
            SET email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::from_db(e, "email already exists"))?;

        user.ok_or_else(|| Error::NotFound(format!("user {id} not found")))
    }

    /// Delete a user. Refused while the user still holds role assignments.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let user = self.get(id).await?;

        let assignments: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM role_manager_user_context_roles WHERE user_id = $1",
        )
        .bind(id)
        .fetch_one(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        if assignments > 0 {
            return Err(Error::Dependency(format!(
                "user '{}' still has {assignments} role assignment(s)",
                user.login
            )));
        }

        sqlx::query("DELETE FROM role_manager_users WHERE id = $1")
            .bind(id)
            .execute(&self.ctx.db)
            .await
            .map_err(|e| Error::from_db_restrict(e, "user still has role assignments"))?;

        self.ctx
            .logger
            .info(&format!("Deleted user '{}'", user.login))
            .await;
        Ok(())
    }

    /// Add the user to a group. Changes the permission structure.
    pub async fn add_to_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        sqlx::query("INSERT INTO role_manager_user_groups (user_id, group_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("duplicate key") {
                    Error::Conflict(format!(
                        "user {user_id} is already a member of group {group_id}"
                    ))
                } else if msg.contains("violates foreign key constraint") {
                    Error::NotFound(format!("user {user_id} or group {group_id} not found"))
                } else {
                    Error::Database(msg)
                }
            })?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove the user from a group. Changes the permission structure.
    pub async fn remove_from_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        let result = sqlx::query(
            "DELETE FROM role_manager_user_groups WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user_id)
        .bind(group_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "user {user_id} is not a member of group {group_id}"
            )));
        }

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Assign a role to the user in a context (`None` = Global Context).
    pub async fn assign_role(
        &self,
        user_id: i64,
        context_id: Option<i64>,
        role_id: i64,
    ) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO role_manager_user_context_roles (user_id, context_id, role_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(context_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") {
                Error::Conflict(format!(
                    "role {role_id} is already assigned to user {user_id} in this context"
                ))
            } else if msg.contains("violates foreign key constraint") {
                Error::NotFound("user, context or role not found".to_string())
            } else {
                Error::Database(msg)
            }
        })?;

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Revoke a role from the user in a context (`None` = Global Context).
    pub async fn revoke_role(
        &self,
        user_id: i64,
        context_id: Option<i64>,
        role_id: i64,
    ) -> Result<()> {
        let mut tx = self.ctx.db.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM role_manager_user_context_roles
            WHERE user_id = $1 AND context_id IS NOT DISTINCT FROM $2 AND role_id = $3
            "#,
        )
        .bind(user_id)
        .bind(context_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "role {role_id} is not assigned to user {user_id} in this context"
            )));
        }

        self.ctx.bump(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

pub(crate) fn validate_login(login: &str) -> Result<()> {
    if login.trim().is_empty() {
        return Err(Error::Validation("login must not be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<()> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    });
    if !valid {
        return Err(Error::Validation(format!("invalid email address '{email}'")));
    }
    Ok(())
}
