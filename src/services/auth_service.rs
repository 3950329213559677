//! Authentication and authorization facade.
//!
//! `authenticate` checks credentials without ever distinguishing an
//! unknown login from a wrong password. `AccessSession` answers
//! `has_right`/`explain_right` queries for the duration of one logical
//! request, going request cache -> shared cache (version-checked) ->
//! resolver.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::authz::{cache_key, resolver, version, CachedRights, RequestCache, ResolvedRights};
use crate::authz::{RightExplanation, RightValue};
use crate::error::{Error, Result};
use crate::models::{AuthenticatedUser, User};
use crate::services::ServiceContext;

/// Authentication facade
pub struct AuthService {
    ctx: ServiceContext,
}

impl AuthService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Check credentials. `Ok(None)` covers both unknown login and wrong
    /// password; only infrastructure failures produce an error.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<AuthenticatedUser>> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, login, email, password_hash, first_name, last_name,
                   created_at, updated_at
            FROM role_manager_users
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.ctx.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let Some(user) = user else {
            return Ok(None);
        };

        if Self::verify_password(password, &user.password_hash)? {
            Ok(Some(user.into()))
        } else {
            Ok(None)
        }
    }

    /// Hash a password
    pub fn hash_password(password: &str) -> Result<String> {
        hash(password, DEFAULT_COST)
            .map_err(|e| Error::Internal(format!("Password hashing failed: {e}")))
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| Error::Internal(format!("Password verification failed: {e}")))
    }

    /// Open an access session for one logical request. The session's
    /// request cache is never version-checked once populated, so keep the
    /// session scoped to the request.
    pub fn session(&self) -> AccessSession {
        AccessSession {
            ctx: self.ctx.clone(),
            request_cache: RequestCache::new(),
        }
    }
}

/// Request-scoped authorization queries.
pub struct AccessSession {
    ctx: ServiceContext,
    request_cache: RequestCache,
}

impl AccessSession {
    /// Whether `user_id` holds `right_name` in `context_id` (`None` = the
    /// Global Context). Absence from the resolved map is the only denial.
    pub async fn has_right(
        &mut self,
        user_id: i64,
        right_name: &str,
        context_id: Option<i64>,
    ) -> Result<bool> {
        let rights = self.resolved(user_id, context_id).await?;
        Ok(rights.has(right_name))
    }

    /// The value `right_name` resolves to, or `None` when denied. Boolean
    /// rights resolve to `true`; range rights to their winning value.
    pub async fn right_value(
        &mut self,
        user_id: i64,
        right_name: &str,
        context_id: Option<i64>,
    ) -> Result<Option<RightValue>> {
        let rights = self.resolved(user_id, context_id).await?;
        Ok(rights.get(right_name).cloned())
    }

    /// Resolve one right with a full annotated trace. Shares the decision
    /// logic with `has_right` but always recomputes, bypassing both cache
    /// levels, so the trace reflects current data.
    pub async fn explain_right(
        &mut self,
        user_id: i64,
        right_name: &str,
        context_id: Option<i64>,
    ) -> Result<RightExplanation> {
        resolver::explain(&self.ctx.db, &self.ctx.logger, user_id, right_name, context_id).await
    }

    async fn resolved(&mut self, user_id: i64, context_id: Option<i64>) -> Result<&ResolvedRights> {
        let key = cache_key(user_id, context_id);

        if self.request_cache.get(&key).is_none() {
            let rights = self.load(&key, user_id, context_id).await?;
            self.request_cache.insert(key.clone(), rights);
        }

        self.request_cache
            .get(&key)
            .ok_or_else(|| Error::Internal("request cache entry vanished".to_string()))
    }

    /// Shared-cache probe with version check, falling back to the
    /// resolver. Shared-cache trouble is never an error here.
    async fn load(
        &self,
        key: &str,
        user_id: i64,
        context_id: Option<i64>,
    ) -> Result<ResolvedRights> {
        let current = version::current(&self.ctx.db).await?;

        if let Some(entry) = self.ctx.cache.fetch(key).await {
            if entry.version == current {
                return Ok(entry.rights);
            }
        }

        let rights = resolver::resolve(&self.ctx.db, &self.ctx.logger, user_id, context_id).await?;
        self.ctx
            .cache
            .store(
                key,
                &CachedRights {
                    version: current,
                    rights: rights.clone(),
                },
            )
            .await;

        Ok(rights)
    }
}
