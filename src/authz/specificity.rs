//! Candidate specificity ranking.
//!
//! Every candidate rule gets a total-order key; smaller is stronger. The
//! dimensions, in decreasing dominance: context specificity, direct-user
//! over group, nearest group.

use serde::Serialize;

use super::candidate::{ContextKind, SourceKind};

/// Maximum number of subgroup edges walked when resolving group
/// membership. Candidates discovered beyond this bound are dropped.
pub const MAX_GROUP_DEPTH: u32 = 10;

/// Total-order ranking key. Derived `Ord` compares the fields
/// lexicographically, which is exactly the dominance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Specificity {
    context_bucket: u8,
    source_bucket: u8,
    distance: u8,
}

impl Specificity {
    pub fn new(context: ContextKind, source: SourceKind, distance: u32) -> Self {
        Self {
            context_bucket: match context {
                ContextKind::Specific => 0,
                ContextKind::Global => 1,
            },
            source_bucket: match source {
                SourceKind::User => 1,
                SourceKind::Group => 2,
            },
            distance: distance.min(MAX_GROUP_DEPTH) as u8,
        }
    }

    /// Packed-integer form used in explain traces. The multipliers exceed
    /// the maximum of the less significant fields, so the integer order
    /// matches the lexicographic order.
    pub fn encode(&self) -> u32 {
        u32::from(self.context_bucket) * 100
            + u32::from(self.source_bucket) * 10
            + u32::from(self.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(context: ContextKind, source: SourceKind, distance: u32) -> Specificity {
        Specificity::new(context, source, distance)
    }

    #[test]
    fn test_context_dominates_source() {
        // A group rule in the specific context beats a direct-user rule in
        // the Global Context.
        let group_specific = key(ContextKind::Specific, SourceKind::Group, 5);
        let user_global = key(ContextKind::Global, SourceKind::User, 0);
        assert!(group_specific < user_global);
    }

    #[test]
    fn test_user_beats_group_within_context() {
        let user = key(ContextKind::Specific, SourceKind::User, 0);
        let group = key(ContextKind::Specific, SourceKind::Group, 0);
        assert!(user < group);
    }

    #[test]
    fn test_nearer_group_beats_farther_group() {
        let near = key(ContextKind::Global, SourceKind::Group, 1);
        let far = key(ContextKind::Global, SourceKind::Group, 2);
        assert!(near < far);
    }

    #[test]
    fn test_equal_keys_compare_equal() {
        let a = key(ContextKind::Global, SourceKind::Group, 3);
        let b = key(ContextKind::Global, SourceKind::Group, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_matches_lexicographic_order() {
        let keys = [
            key(ContextKind::Specific, SourceKind::User, 0),
            key(ContextKind::Specific, SourceKind::Group, 0),
            key(ContextKind::Specific, SourceKind::Group, 10),
            key(ContextKind::Global, SourceKind::User, 0),
            key(ContextKind::Global, SourceKind::Group, 0),
            key(ContextKind::Global, SourceKind::Group, 10),
        ];
        for window in keys.windows(2) {
            assert!(window[0] < window[1]);
            assert!(window[0].encode() < window[1].encode());
        }
    }

    #[test]
    fn test_encode_values() {
        assert_eq!(key(ContextKind::Specific, SourceKind::User, 0).encode(), 10);
        assert_eq!(key(ContextKind::Specific, SourceKind::Group, 2).encode(), 22);
        assert_eq!(key(ContextKind::Global, SourceKind::User, 0).encode(), 110);
        assert_eq!(key(ContextKind::Global, SourceKind::Group, 10).encode(), 130);
    }

    #[test]
    fn test_distance_clamped_to_bound() {
        let clamped = key(ContextKind::Global, SourceKind::Group, 99);
        let max = key(ContextKind::Global, SourceKind::Group, MAX_GROUP_DEPTH);
        assert_eq!(clamped, max);
    }
}
