//! Role Manager - embeddable role-based access control engine.
//!
//! Resolves, for a given user and context, which rights apply and with
//! what value. The embedding application owns the database pool and any
//! session or transport machinery; this crate owns the authorization data
//! model, the precedence algorithm, and the cache coherence protocol.

#[macro_use]
mod macros;

pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod logger;
pub mod models;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

pub use config::Config;
pub use error::{Error, Result};

use authz::{InMemoryCache, NoopCache, SharedCache};
use logger::{LogLevel, Logger};
use services::{
    AuthService, ContextService, GroupService, RightGroupService, RightService, RightTypeService,
    RoleService, ServiceContext, UserService,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bundled schema, applied with [`db::apply_schema`] or by hand.
pub const SCHEMA_SQL: &str = include_str!("../rolemanager-create.sql");

/// Engine facade. Cheap to clone service handles off; construct once per
/// process and hand out the per-entity services where needed.
pub struct RoleManager {
    ctx: ServiceContext,
}

impl RoleManager {
    /// Build an engine over the caller's pool with the in-process shared
    /// cache.
    pub fn new(db: PgPool) -> Self {
        Self::with_cache(db, Arc::new(InMemoryCache::new()))
    }

    /// Build an engine with a caller-supplied shared-cache backend. Pass
    /// [`NoopCache`] for request-scope caching only.
    pub fn with_cache(db: PgPool, cache: Arc<dyn SharedCache>) -> Self {
        let logger = Arc::new(Logger::new(db.clone(), LogLevel::Warning, LogLevel::Error));
        Self {
            ctx: ServiceContext { db, logger, cache },
        }
    }

    /// Connect and build an engine from environment configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = db::create_pool(&config.database_url).await?;
        let cache: Arc<dyn SharedCache> = if config.shared_cache {
            Arc::new(InMemoryCache::new())
        } else {
            Arc::new(NoopCache)
        };
        let logger = Arc::new(Logger::new(
            db.clone(),
            config.console_log_level,
            config.db_log_level,
        ));
        Ok(Self {
            ctx: ServiceContext { db, logger, cache },
        })
    }

    pub fn logger(&self) -> &Logger {
        &self.ctx.logger
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.ctx.clone())
    }

    pub fn groups(&self) -> GroupService {
        GroupService::new(self.ctx.clone())
    }

    pub fn rights(&self) -> RightService {
        RightService::new(self.ctx.clone())
    }

    pub fn right_groups(&self) -> RightGroupService {
        RightGroupService::new(self.ctx.clone())
    }

    pub fn right_types(&self) -> RightTypeService {
        RightTypeService::new(self.ctx.clone())
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(self.ctx.clone())
    }

    pub fn contexts(&self) -> ContextService {
        ContextService::new(self.ctx.clone())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.ctx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_is_bundled() {
        assert!(SCHEMA_SQL.contains("role_manager_users"));
        assert!(SCHEMA_SQL.contains("permissions_version"));
    }

    #[test]
    fn test_version_matches_manifest() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(!VERSION.is_empty());
    }
}
