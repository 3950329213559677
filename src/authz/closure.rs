//! Group closure resolution.
//!
//! Walks from a user's direct memberships through child -> parent subgroup
//! edges and reports every reachable group with its minimum hop distance.
//! The walk is bounded so malformed (cyclic) data written by a concurrent
//! writer cannot cause non-termination.

use sqlx::{PgExecutor, PgPool};

use crate::error::{Error, Result};
use crate::logger::Logger;

use super::specificity::MAX_GROUP_DEPTH;

/// A group reachable from a user, with the minimum number of subgroup
/// edges traversed (0 for a direct membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDistance {
    pub group_id: i64,
    pub distance: u32,
}

/// Bounded upward-closure CTE, shared with the candidate enumerator so
/// there is exactly one implementation of the walk. Binds: `$1` the user
/// id, `$2` the depth bound. The recursion runs one hop past the bound so
/// truncation is observable; `closure (group_id, depth)` carries the
/// minimum depth per reachable group.
pub(crate) const CLOSURE_CTE: &str = r#"
WITH RECURSIVE reachable (group_id, depth) AS (
    SELECT ug.group_id, 0
    FROM role_manager_user_groups ug
    WHERE ug.user_id = $1
    UNION ALL
    SELECT gs.parent_group_id, r.depth + 1
    FROM role_manager_group_subgroups gs
    JOIN reachable r ON gs.child_group_id = r.group_id
    WHERE r.depth <= $2
),
closure (group_id, depth) AS (
    SELECT group_id, MIN(depth)
    FROM reachable
    GROUP BY group_id
)
"#;

/// Compute `G(u)`: every group reachable upward from the user's direct
/// memberships, deduplicated by group with the minimum distance kept.
/// Groups only reachable beyond [`MAX_GROUP_DEPTH`] are dropped and a
/// warning is emitted.
pub async fn group_closure(
    pool: &PgPool,
    logger: &Logger,
    user_id: i64,
) -> Result<Vec<GroupDistance>> {
    let sql = format!("{CLOSURE_CTE} SELECT group_id, depth FROM closure ORDER BY depth, group_id");
    let rows: Vec<(i64, i32)> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(MAX_GROUP_DEPTH as i32)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    let (closure, dropped) = cap_depth(rows);
    if dropped > 0 {
        logger
            .warning(&format!(
                "Group traversal for user {user_id} exceeded depth {MAX_GROUP_DEPTH}; \
                 {dropped} group(s) dropped"
            ))
            .await;
    }

    Ok(closure)
}

/// The descendant closure of a group: every group reachable by following
/// parent -> child edges. Used to reject subgroup edges that would close a
/// cycle; runs on the caller's executor so it can take part in the edge
/// insertion transaction.
pub async fn descendant_groups<'e, E>(executor: E, group_id: i64) -> Result<Vec<i64>>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        WITH RECURSIVE descendants (group_id) AS (
            SELECT child_group_id
            FROM role_manager_group_subgroups
            WHERE parent_group_id = $1
            UNION
            SELECT gs.child_group_id
            FROM role_manager_group_subgroups gs
            JOIN descendants d ON gs.parent_group_id = d.group_id
        )
        SELECT group_id FROM descendants
        "#,
    )
    .bind(group_id)
    .fetch_all(executor)
    .await
    .map_err(|e| Error::Database(e.to_string()))?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Split raw (group_id, min_depth) rows into the in-bound closure and the
/// count of rows beyond the depth bound.
fn cap_depth(rows: Vec<(i64, i32)>) -> (Vec<GroupDistance>, usize) {
    let total = rows.len();
    let closure: Vec<GroupDistance> = rows
        .into_iter()
        .filter(|(_, depth)| *depth <= MAX_GROUP_DEPTH as i32)
        .map(|(group_id, depth)| GroupDistance {
            group_id,
            distance: depth as u32,
        })
        .collect();
    let dropped = total - closure.len();
    (closure, dropped)
}
