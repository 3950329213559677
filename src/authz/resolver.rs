//! Permission resolution.
//!
//! The fast path reduces the enumerated candidates to one winner per right
//! and returns the right -> value mapping that is also the cache payload.
//! The explain path keeps every candidate for a single right and annotates
//! the winner and the overridden rules. Both share the same ranking, so
//! the diagnostic output always matches the enforced decision.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::Result;
use crate::logger::Logger;
use crate::models::RightKind;

use super::candidate::{enumerate, Candidate, CandidateSet, ContextKind};

/// Value a granted right resolves to. Boolean rights always resolve to
/// `true`; absence from the resolved map is the only denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RightValue {
    Boolean(bool),
    Range(Decimal),
}

impl RightValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            RightValue::Boolean(_) => None,
            RightValue::Range(v) => Some(*v),
        }
    }
}

/// Resolved right -> value mapping for one (user, context) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedRights(pub HashMap<String, RightValue>);

impl ResolvedRights {
    pub fn get(&self, right_name: &str) -> Option<&RightValue> {
        self.0.get(right_name)
    }

    pub fn has(&self, right_name: &str) -> bool {
        self.0.contains_key(right_name)
    }
}

/// Outcome of a candidate in an explain trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    Applied,
    Overridden,
}

/// One candidate in an explain trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub source: String,
    pub role: String,
    pub context: String,
    pub value: RightValue,
    /// Packed specificity key; smaller is stronger.
    pub specificity: u32,
    pub status: RuleStatus,
}

/// Diagnostic resolution of a single right.
#[derive(Debug, Clone, Serialize)]
pub struct RightExplanation {
    pub decision: bool,
    pub value: Option<RightValue>,
    pub reason: String,
    pub trace: Vec<TraceEntry>,
}

/// Resolve the full right -> value mapping for `user_id` in `context_id`.
pub async fn resolve(
    pool: &PgPool,
    logger: &Logger,
    user_id: i64,
    context_id: Option<i64>,
) -> Result<ResolvedRights> {
    let set = enumerate(pool, logger, user_id, context_id, None).await?;
    Ok(select_winners(set))
}

/// Resolve a single right with a full annotated trace.
pub async fn explain(
    pool: &PgPool,
    logger: &Logger,
    user_id: i64,
    right_name: &str,
    context_id: Option<i64>,
) -> Result<RightExplanation> {
    let set = enumerate(pool, logger, user_id, context_id, Some(right_name)).await?;
    Ok(explain_candidates(set))
}

fn candidate_value(candidate: &Candidate) -> RightValue {
    match candidate.right_kind {
        RightKind::Boolean => RightValue::Boolean(true),
        RightKind::Range => RightValue::Range(candidate.range_value.unwrap_or_default()),
    }
}

/// Total order used to pick winners: ascending specificity, then for range
/// rights the greater raw value, then the stable (source_id, role_name)
/// tie-breaker.
fn winner_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.specificity()
        .cmp(&b.specificity())
        .then_with(|| match (a.range_value, b.range_value) {
            (Some(av), Some(bv)) => bv.cmp(&av),
            _ => Ordering::Equal,
        })
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.role_name.cmp(&b.role_name))
}

/// A user pinned to the queried context by a direct assignment in it does
/// not see the Global Context layer at all.
fn mask_global_layer(set: CandidateSet) -> Vec<Candidate> {
    let CandidateSet { mut candidates, pinned } = set;
    if pinned {
        candidates.retain(|c| c.context_kind == ContextKind::Specific);
    }
    candidates
}

/// Fast path: one winner per right.
pub(crate) fn select_winners(set: CandidateSet) -> ResolvedRights {
    let mut winners: HashMap<String, Candidate> = HashMap::new();
    for candidate in mask_global_layer(set) {
        match winners.get(&candidate.right_name) {
            Some(current) if winner_order(current, &candidate) != Ordering::Greater => {}
            _ => {
                winners.insert(candidate.right_name.clone(), candidate);
            }
        }
    }

    ResolvedRights(
        winners
            .into_iter()
            .map(|(right, candidate)| (right, candidate_value(&candidate)))
            .collect(),
    )
}

/// Explain path: the winner is annotated `APPLIED` and sorts first, every
/// other candidate is `OVERRIDDEN` and sorts by ascending specificity.
pub(crate) fn explain_candidates(set: CandidateSet) -> RightExplanation {
    let mut candidates = mask_global_layer(set);
    if candidates.is_empty() {
        return RightExplanation {
            decision: false,
            value: None,
            reason: "No rule found granting this right.".to_string(),
            trace: vec![],
        };
    }

    candidates.sort_by(winner_order);
    let winner = &candidates[0];
    let value = candidate_value(winner);
    let reason = format!(
        "Right granted by role '{}' from source '{}' in context '{}'.",
        winner.role_name, winner.source_name, winner.context_name
    );

    let trace = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| TraceEntry {
            source: candidate.source_name.clone(),
            role: candidate.role_name.clone(),
            context: candidate.context_name.clone(),
            value: candidate_value(candidate),
            specificity: candidate.specificity().encode(),
            status: if i == 0 {
                RuleStatus::Applied
            } else {
                RuleStatus::Overridden
            },
        })
        .collect();

    RightExplanation {
        decision: true,
        value: Some(value),
        reason,
        trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::candidate::SourceKind;
    use rust_decimal_macros::dec;

    // -----------------------------------------------------------------------
    // Fixture: the editorial scenario.
    //
    // Groups: Staff > Editors > Proofreaders, plus Marketing.
    // alice is in Editors and Marketing; bob is in Proofreaders.
    // Roles: Reader={view}, Proofreader={edit}, Editor={publish,
    // approve_budget=2000}, Marketing={approve_budget=2500},
    // JuniorManager={approve_budget=1000}, Intern={view}.
    // Assignments: Staff->Reader@Global, Proofreaders->Proofreader@Global,
    // Proofreaders->Proofreader@Alpha, Editors->Editor@Alpha,
    // Marketing->Marketing@Alpha, alice->JuniorManager@Beta,
    // bob->Intern@Omega.
    // -----------------------------------------------------------------------

    fn bool_cand(
        source_kind: SourceKind,
        source_id: i64,
        source_name: &str,
        role: &str,
        context: Option<&str>,
        right: &str,
        distance: u32,
    ) -> Candidate {
        Candidate {
            source_kind,
            source_id,
            source_name: source_name.to_string(),
            role_name: role.to_string(),
            context_kind: if context.is_some() {
                ContextKind::Specific
            } else {
                ContextKind::Global
            },
            context_name: context.unwrap_or("Global").to_string(),
            right_name: right.to_string(),
            right_kind: RightKind::Boolean,
            range_value: None,
            distance,
        }
    }

    fn range_cand(
        source_kind: SourceKind,
        source_id: i64,
        source_name: &str,
        role: &str,
        context: Option<&str>,
        right: &str,
        value: Decimal,
        distance: u32,
    ) -> Candidate {
        Candidate {
            right_kind: RightKind::Range,
            range_value: Some(value),
            ..bool_cand(source_kind, source_id, source_name, role, context, right, distance)
        }
    }

    const STAFF: i64 = 1;
    const EDITORS: i64 = 2;
    const PROOFREADERS: i64 = 3;
    const MARKETING: i64 = 4;
    const ALICE: i64 = 10;
    const BOB: i64 = 11;

    /// Candidates the enumerator yields for (bob, Alpha).
    fn bob_alpha() -> CandidateSet {
        CandidateSet {
            candidates: vec![
                bool_cand(SourceKind::Group, STAFF, "Staff", "Reader", None, "view_article", 2),
                bool_cand(
                    SourceKind::Group,
                    PROOFREADERS,
                    "Proofreaders",
                    "Proofreader",
                    None,
                    "edit_article",
                    0,
                ),
                bool_cand(
                    SourceKind::Group,
                    PROOFREADERS,
                    "Proofreaders",
                    "Proofreader",
                    Some("Alpha"),
                    "edit_article",
                    0,
                ),
                bool_cand(
                    SourceKind::Group,
                    EDITORS,
                    "Editors",
                    "Editor",
                    Some("Alpha"),
                    "publish_article",
                    1,
                ),
                range_cand(
                    SourceKind::Group,
                    EDITORS,
                    "Editors",
                    "Editor",
                    Some("Alpha"),
                    "approve_budget",
                    dec!(2000.00),
                    1,
                ),
            ],
            pinned: false,
        }
    }

    /// Candidates the enumerator yields for (alice, Alpha).
    fn alice_alpha() -> CandidateSet {
        CandidateSet {
            candidates: vec![
                bool_cand(SourceKind::Group, STAFF, "Staff", "Reader", None, "view_article", 1),
                bool_cand(
                    SourceKind::Group,
                    EDITORS,
                    "Editors",
                    "Editor",
                    Some("Alpha"),
                    "publish_article",
                    0,
                ),
                range_cand(
                    SourceKind::Group,
                    EDITORS,
                    "Editors",
                    "Editor",
                    Some("Alpha"),
                    "approve_budget",
                    dec!(2000.00),
                    0,
                ),
                range_cand(
                    SourceKind::Group,
                    MARKETING,
                    "Marketing",
                    "Marketing",
                    Some("Alpha"),
                    "approve_budget",
                    dec!(2500.00),
                    0,
                ),
            ],
            pinned: false,
        }
    }

    /// Candidates the enumerator yields for (alice, Beta). alice holds a
    /// direct assignment in Beta, so she is pinned.
    fn alice_beta() -> CandidateSet {
        CandidateSet {
            candidates: vec![
                range_cand(
                    SourceKind::User,
                    ALICE,
                    "alice",
                    "JuniorManager",
                    Some("Beta"),
                    "approve_budget",
                    dec!(1000.00),
                    0,
                ),
                bool_cand(SourceKind::Group, STAFF, "Staff", "Reader", None, "view_article", 1),
            ],
            pinned: true,
        }
    }

    /// Candidates the enumerator yields for (bob, Global).
    fn bob_global() -> CandidateSet {
        CandidateSet {
            candidates: vec![
                bool_cand(SourceKind::Group, STAFF, "Staff", "Reader", None, "view_article", 2),
                bool_cand(
                    SourceKind::Group,
                    PROOFREADERS,
                    "Proofreaders",
                    "Proofreader",
                    None,
                    "edit_article",
                    0,
                ),
            ],
            pinned: false,
        }
    }

    /// Candidates the enumerator yields for (bob, Omega). bob holds a
    /// direct Intern assignment in Omega, so he is pinned.
    fn bob_omega() -> CandidateSet {
        CandidateSet {
            candidates: vec![
                bool_cand(SourceKind::User, BOB, "bob", "Intern", Some("Omega"), "view_article", 0),
                bool_cand(SourceKind::Group, STAFF, "Staff", "Reader", None, "view_article", 2),
                bool_cand(
                    SourceKind::Group,
                    PROOFREADERS,
                    "Proofreaders",
                    "Proofreader",
                    None,
                    "edit_article",
                    0,
                ),
            ],
            pinned: true,
        }
    }

    fn only(set: CandidateSet, right: &str) -> CandidateSet {
        CandidateSet {
            candidates: set
                .candidates
                .into_iter()
                .filter(|c| c.right_name == right)
                .collect(),
            pinned: set.pinned,
        }
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn test_bob_inherits_global_reader_through_nested_groups() {
        let rights = select_winners(bob_alpha());
        assert_eq!(rights.get("view_article"), Some(&RightValue::Boolean(true)));
    }

    #[test]
    fn test_alice_publishes_in_alpha() {
        let rights = select_winners(alice_alpha());
        assert!(rights.has("publish_article"));
    }

    #[test]
    fn test_bob_publishes_in_alpha_via_parent_group() {
        let rights = select_winners(bob_alpha());
        assert!(rights.has("publish_article"));
    }

    #[test]
    fn test_alice_cannot_publish_in_beta() {
        let rights = select_winners(alice_beta());
        assert!(!rights.has("publish_article"));
    }

    #[test]
    fn test_direct_user_assignment_wins_in_beta() {
        let rights = select_winners(alice_beta());
        assert_eq!(
            rights.get("approve_budget"),
            Some(&RightValue::Range(dec!(1000.00)))
        );
    }

    #[test]
    fn test_bob_edits_in_global_context() {
        let rights = select_winners(bob_global());
        assert!(rights.has("edit_article"));
    }

    #[test]
    fn test_context_pinning_masks_global_layer() {
        // bob's Intern assignment in Omega pins him there; the Global
        // Proofreader grant no longer applies.
        let rights = select_winners(bob_omega());
        assert!(!rights.has("edit_article"));
        assert_eq!(rights.get("view_article"), Some(&RightValue::Boolean(true)));
    }

    #[test]
    fn test_equal_specificity_range_tie_greater_value_wins() {
        let rights = select_winners(alice_alpha());
        assert_eq!(
            rights.get("approve_budget"),
            Some(&RightValue::Range(dec!(2500.00)))
        );
    }

    #[test]
    fn test_explain_alice_approve_budget_alpha() {
        let explanation = explain_candidates(only(alice_alpha(), "approve_budget"));
        assert!(explanation.decision);
        assert_eq!(explanation.value, Some(RightValue::Range(dec!(2500.00))));
        assert_eq!(
            explanation.reason,
            "Right granted by role 'Marketing' from source 'Marketing' in context 'Alpha'."
        );
        assert_eq!(explanation.trace.len(), 2);
        assert_eq!(explanation.trace[0].status, RuleStatus::Applied);
        assert_eq!(explanation.trace[0].role, "Marketing");
        assert_eq!(explanation.trace[1].status, RuleStatus::Overridden);
        assert_eq!(explanation.trace[1].role, "Editor");
    }

    // -----------------------------------------------------------------------
    // Ranking details
    // -----------------------------------------------------------------------

    #[test]
    fn test_specific_context_beats_global_per_right() {
        let set = CandidateSet {
            candidates: vec![
                range_cand(
                    SourceKind::Group,
                    EDITORS,
                    "Editors",
                    "Editor",
                    Some("Alpha"),
                    "approve_budget",
                    dec!(100.00),
                    0,
                ),
                range_cand(
                    SourceKind::Group,
                    STAFF,
                    "Staff",
                    "BigSpender",
                    None,
                    "approve_budget",
                    dec!(9999.00),
                    0,
                ),
            ],
            pinned: false,
        };
        // The specific-context rule wins even though its value is smaller.
        let rights = select_winners(set);
        assert_eq!(
            rights.get("approve_budget"),
            Some(&RightValue::Range(dec!(100.00)))
        );
    }

    #[test]
    fn test_nearer_group_beats_farther_group() {
        let set = CandidateSet {
            candidates: vec![
                range_cand(
                    SourceKind::Group,
                    STAFF,
                    "Staff",
                    "Wide",
                    None,
                    "approve_budget",
                    dec!(500.00),
                    2,
                ),
                range_cand(
                    SourceKind::Group,
                    PROOFREADERS,
                    "Proofreaders",
                    "Narrow",
                    None,
                    "approve_budget",
                    dec!(50.00),
                    0,
                ),
            ],
            pinned: false,
        };
        let rights = select_winners(set);
        assert_eq!(
            rights.get("approve_budget"),
            Some(&RightValue::Range(dec!(50.00)))
        );
    }

    #[test]
    fn test_boolean_tie_breaks_deterministically() {
        let a = bool_cand(SourceKind::Group, 5, "Alpha Team", "RoleB", None, "view_article", 1);
        let b = bool_cand(SourceKind::Group, 3, "Beta Team", "RoleA", None, "view_article", 1);
        let forward = select_winners(CandidateSet {
            candidates: vec![a.clone(), b.clone()],
            pinned: false,
        });
        let reverse = select_winners(CandidateSet {
            candidates: vec![b, a],
            pinned: false,
        });
        assert_eq!(forward, reverse);
        assert_eq!(forward.get("view_article"), Some(&RightValue::Boolean(true)));
    }

    #[test]
    fn test_equal_value_range_tie_is_stable() {
        // Same specificity and same numeric value: the (source_id,
        // role_name) order decides, independent of enumeration order.
        let a = range_cand(
            SourceKind::Group,
            7,
            "Second",
            "RoleZ",
            None,
            "approve_budget",
            dec!(300.00),
            1,
        );
        let b = range_cand(
            SourceKind::Group,
            2,
            "First",
            "RoleA",
            None,
            "approve_budget",
            dec!(300.00),
            1,
        );
        let forward = explain_candidates(CandidateSet {
            candidates: vec![a.clone(), b.clone()],
            pinned: false,
        });
        let reverse = explain_candidates(CandidateSet {
            candidates: vec![b, a],
            pinned: false,
        });
        assert_eq!(forward.trace[0].source, "First");
        assert_eq!(reverse.trace[0].source, "First");
    }

    #[test]
    fn test_empty_candidates_deny() {
        let rights = select_winners(CandidateSet {
            candidates: vec![],
            pinned: false,
        });
        assert!(rights.0.is_empty());

        let explanation = explain_candidates(CandidateSet {
            candidates: vec![],
            pinned: false,
        });
        assert!(!explanation.decision);
        assert_eq!(explanation.value, None);
        assert_eq!(explanation.reason, "No rule found granting this right.");
        assert!(explanation.trace.is_empty());
    }

    #[test]
    fn test_explain_trace_sorted_by_ascending_specificity() {
        let explanation = explain_candidates(only(bob_omega(), "view_article"));
        assert!(explanation.decision);
        // The pinned user only sees the Omega rule; globals are masked.
        assert_eq!(explanation.trace.len(), 1);
        assert_eq!(explanation.trace[0].specificity, 10);

        let explanation = explain_candidates(only(bob_alpha(), "edit_article"));
        assert_eq!(explanation.trace.len(), 2);
        assert!(explanation.trace[0].specificity < explanation.trace[1].specificity);
        assert_eq!(explanation.trace[0].context, "Alpha");
        assert_eq!(explanation.trace[1].context, "Global");
    }

    #[test]
    fn test_range_value_propagated_verbatim() {
        let set = CandidateSet {
            candidates: vec![range_cand(
                SourceKind::User,
                ALICE,
                "alice",
                "JuniorManager",
                Some("Beta"),
                "approve_budget",
                dec!(1000.50),
                0,
            )],
            pinned: true,
        };
        let rights = select_winners(set);
        assert_eq!(
            rights.get("approve_budget").unwrap().as_decimal(),
            Some(dec!(1000.50))
        );
    }

    // -----------------------------------------------------------------------
    // Serialization of the cache payload
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolved_rights_serde_roundtrip() {
        let mut map = HashMap::new();
        map.insert("view_article".to_string(), RightValue::Boolean(true));
        map.insert(
            "approve_budget".to_string(),
            RightValue::Range(dec!(2500.00)),
        );
        let rights = ResolvedRights(map);

        let json = serde_json::to_string(&rights).unwrap();
        let back: ResolvedRights = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rights);
        assert_eq!(
            back.get("approve_budget").unwrap().as_decimal(),
            Some(dec!(2500.00))
        );
    }

    #[test]
    fn test_rule_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(RuleStatus::Applied).unwrap(),
            "APPLIED"
        );
        assert_eq!(
            serde_json::to_value(RuleStatus::Overridden).unwrap(),
            "OVERRIDDEN"
        );
    }
}
