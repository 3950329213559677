//! Candidate enumeration.
//!
//! For a (user, context) pair, yields every rule that might grant a right:
//! direct role assignments of the user plus role assignments of every group
//! reachable through the subgroup hierarchy, restricted to the queried
//! context or the Global Context. A single recursive query produces both
//! branches, tagged with their source type.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::models::RightKind;

use super::closure::CLOSURE_CTE;
use super::specificity::{Specificity, MAX_GROUP_DEPTH};

/// Origin of a candidate rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    User,
    Group,
}

/// Context layer of a candidate rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Specific,
    Global,
}

/// A rule that could, absent other rules, grant a right to the user.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source_kind: SourceKind,
    pub source_id: i64,
    /// Login for user sources, group name for group sources.
    pub source_name: String,
    pub role_name: String,
    pub context_kind: ContextKind,
    /// Context name, or the literal "Global" for the Global Context.
    pub context_name: String,
    pub right_name: String,
    pub right_kind: RightKind,
    /// Raw stored value for range rights, propagated verbatim.
    pub range_value: Option<Decimal>,
    /// Subgroup hops from the user; 0 for user sources and direct
    /// memberships.
    pub distance: u32,
}

impl Candidate {
    pub fn specificity(&self) -> Specificity {
        let distance = match self.source_kind {
            SourceKind::User => 0,
            SourceKind::Group => self.distance,
        };
        Specificity::new(self.context_kind, self.source_kind, distance)
    }
}

/// Enumeration result: the candidate rules plus whether the user is pinned
/// to the queried context by a direct assignment in it.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub candidates: Vec<Candidate>,
    pub pinned: bool,
}

#[derive(FromRow)]
struct CandidateRow {
    source_type: String,
    source_id: i64,
    source_name: String,
    role_name: String,
    context_name: Option<String>,
    right_name: String,
    right_kind: RightKind,
    range_value: Option<Decimal>,
    distance: i32,
}

/// Both candidate branches, appended to [`CLOSURE_CTE`]'s bounded group
/// walk. Binds: `$3` the context id (`NULL` for Global-only), `$4` the
/// optional right-name filter.
const CANDIDATE_UNION_SQL: &str = r#"
SELECT 'user'  AS source_type,
       u.id    AS source_id,
       u.login AS source_name,
       ro.name AS role_name,
       c.name  AS context_name,
       ri.name AS right_name,
       ri.kind AS right_kind,
       rr.range_value,
       0       AS distance
FROM role_manager_user_context_roles ucr
JOIN role_manager_users u        ON u.id = ucr.user_id
JOIN role_manager_roles ro       ON ro.id = ucr.role_id
JOIN role_manager_role_rights rr ON rr.role_id = ro.id
JOIN role_manager_rights ri      ON ri.id = rr.right_id
LEFT JOIN role_manager_contexts c ON c.id = ucr.context_id
WHERE ucr.user_id = $1
  AND (ucr.context_id = $3::bigint OR ucr.context_id IS NULL)
  AND ($4::text IS NULL OR ri.name = $4)
UNION ALL
SELECT 'group', g.id, g.name, ro.name, c.name, ri.name, ri.kind, rr.range_value, cl.depth
FROM closure cl
JOIN role_manager_groups g                ON g.id = cl.group_id
JOIN role_manager_group_context_roles gcr ON gcr.group_id = cl.group_id
JOIN role_manager_roles ro                ON ro.id = gcr.role_id
JOIN role_manager_role_rights rr          ON rr.role_id = ro.id
JOIN role_manager_rights ri               ON ri.id = rr.right_id
LEFT JOIN role_manager_contexts c ON c.id = gcr.context_id
WHERE (gcr.context_id = $3::bigint OR gcr.context_id IS NULL)
  AND ($4::text IS NULL OR ri.name = $4)
"#;

/// Enumerate every rule that could grant a right to `user_id` in
/// `context_id` (`None` queries the Global Context alone). `right_name`
/// restricts the enumeration for the explain path.
pub async fn enumerate(
    pool: &PgPool,
    logger: &Logger,
    user_id: i64,
    context_id: Option<i64>,
    right_name: Option<&str>,
) -> Result<CandidateSet> {
    let sql = format!("{CLOSURE_CTE} {CANDIDATE_UNION_SQL}");
    let rows: Vec<CandidateRow> = sqlx::query_as(&sql)
        .bind(user_id)
        // The recursion runs one hop past the bound so truncation is
        // observable and can be reported.
        .bind(MAX_GROUP_DEPTH as i32)
        .bind(context_id)
        .bind(right_name)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    let total = rows.len();
    let mut candidates = Vec::with_capacity(total);
    for row in rows {
        if row.distance > MAX_GROUP_DEPTH as i32 {
            continue;
        }
        candidates.push(row_to_candidate(row)?);
    }

    let dropped = total - candidates.len();
    if dropped > 0 {
        logger
            .warning(&format!(
                "Group traversal for user {user_id} exceeded depth {MAX_GROUP_DEPTH}; \
                 {dropped} candidate(s) dropped"
            ))
            .await;
    }

    let pinned = match context_id {
        Some(_) => user_has_context_assignment(pool, user_id, context_id).await?,
        None => false,
    };

    Ok(CandidateSet { candidates, pinned })
}

/// Whether the user holds a direct role assignment in the given specific
/// context. When true, the Global Context layer is masked for the query.
async fn user_has_context_assignment(
    pool: &PgPool,
    user_id: i64,
    context_id: Option<i64>,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM role_manager_user_context_roles
            WHERE user_id = $1 AND context_id = $2
        )
        "#,
    )
    .bind(user_id)
    .bind(context_id)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::Database(e.to_string()))?;

    Ok(exists)
}

fn row_to_candidate(row: CandidateRow) -> Result<Candidate> {
    let source_kind = match row.source_type.as_str() {
        "user" => SourceKind::User,
        "group" => SourceKind::Group,
        other => {
            return Err(Error::Internal(format!(
                "unexpected candidate source type '{other}'"
            )))
        }
    };
    let (context_kind, context_name) = match row.context_name {
        Some(name) => (ContextKind::Specific, name),
        None => (ContextKind::Global, "Global".to_string()),
    };

    Ok(Candidate {
        source_kind,
        source_id: row.source_id,
        source_name: row.source_name,
        role_name: row.role_name,
        context_kind,
        context_name,
        right_name: row.right_name,
        right_kind: row.right_kind,
        range_value: row.range_value,
        distance: row.distance as u32,
    })
}
