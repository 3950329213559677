//! Authorization core: candidate enumeration, specificity ranking,
//! resolution, and the two-level version-stamped cache.

pub mod cache;
pub mod candidate;
pub mod closure;
pub mod resolver;
pub mod specificity;
pub mod version;

pub use cache::{cache_key, CachedRights, InMemoryCache, NoopCache, RequestCache, SharedCache};
pub use candidate::{Candidate, CandidateSet, ContextKind, SourceKind};
pub use closure::{group_closure, GroupDistance};
pub use resolver::{ResolvedRights, RightExplanation, RightValue, RuleStatus, TraceEntry};
pub use specificity::{Specificity, MAX_GROUP_DEPTH};
