//! Entity services.
//!
//! Each service owns the persistence logic for one entity family and is
//! handed a [`ServiceContext`]: the shared store handle, the two-channel
//! logger, and the permissions-version bump used by every write that can
//! change a resolution outcome.

use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};

use crate::authz::{version, SharedCache};
use crate::error::Result;
use crate::logger::Logger;

pub mod auth_service;
pub mod context_service;
pub mod group_service;
pub mod right_service;
pub mod rightgroup_service;
pub mod righttype_service;
pub mod role_service;
pub mod user_service;

pub use auth_service::{AccessSession, AuthService};
pub use context_service::ContextService;
pub use group_service::GroupService;
pub use right_service::RightService;
pub use rightgroup_service::RightGroupService;
pub use righttype_service::RightTypeService;
pub use role_service::RoleService;
pub use user_service::UserService;

/// Shared dependencies threaded to every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub db: PgPool,
    pub logger: Arc<Logger>,
    pub cache: Arc<dyn SharedCache>,
}

impl ServiceContext {
    /// Increment the permissions version inside `tx`. Every mutation that
    /// can change a permission outcome calls this before committing.
    pub(crate) async fn bump(&self, tx: &mut Transaction<'_, Postgres>) -> Result<i64> {
        version::bump(tx).await
    }
}
