//! Database models (SQLx).

pub mod context;
pub mod group;
pub mod right;
pub mod role;
pub mod user;

pub use context::Context;
pub use group::Group;
pub use right::{Right, RightGroup, RightKind, RightTypeRange};
pub use role::{Role, RoleRight};
pub use user::{AuthenticatedUser, User};
