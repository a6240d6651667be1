//! Sibling ordering shared by every ordered collection.
//!
//! New siblings start at position 1; each later insert takes `max + 1`.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::hierarchy::immediate;
use super::{owner_of, NodeKind};
use crate::db::now_ts;
use crate::error::{ContentError, ContentResult};

pub const FIRST_POSITION: i64 = 1;

/// A table whose rows are ordered under a parent id.
pub trait OrderedScope {
    fn label(&self) -> &'static str;
    fn table(&self) -> &'static str;
    fn parent_column(&self) -> &'static str;
    fn has_updated_at(&self) -> bool {
        true
    }
    /// User allowed to reorder children of `parent_id`.
    fn parent_owner(&self, conn: &Connection, parent_id: &str) -> ContentResult<String>;
}

/// Children of one content kind under their parent node.
#[derive(Clone, Copy, Debug)]
pub struct ChildrenOf {
    child: NodeKind,
    parent: NodeKind,
    parent_column: &'static str,
}

impl ChildrenOf {
    pub fn new(child: NodeKind) -> Option<Self> {
        Some(Self {
            child,
            parent: child.parent()?,
            parent_column: child.parent_column()?,
        })
    }
}

impl OrderedScope for ChildrenOf {
    fn label(&self) -> &'static str {
        self.child.label()
    }

    fn table(&self) -> &'static str {
        self.child.table()
    }

    fn parent_column(&self) -> &'static str {
        self.parent_column
    }

    fn parent_owner(&self, conn: &Connection, parent_id: &str) -> ContentResult<String> {
        owner_of(conn, self.parent, parent_id)
    }
}

/// A user's favorite videos.
pub struct FavoriteVideos;

impl OrderedScope for FavoriteVideos {
    fn label(&self) -> &'static str {
        "favorite video"
    }
    fn table(&self) -> &'static str {
        "favorite_videos"
    }
    fn parent_column(&self) -> &'static str {
        "user_id"
    }
    fn has_updated_at(&self) -> bool {
        false
    }
    fn parent_owner(&self, _conn: &Connection, parent_id: &str) -> ContentResult<String> {
        Ok(parent_id.to_string())
    }
}

/// A user's profile links.
pub struct ProfileLinks;

impl OrderedScope for ProfileLinks {
    fn label(&self) -> &'static str {
        "profile link"
    }
    fn table(&self) -> &'static str {
        "profile_links"
    }
    fn parent_column(&self) -> &'static str {
        "user_id"
    }
    fn has_updated_at(&self) -> bool {
        false
    }
    fn parent_owner(&self, _conn: &Connection, parent_id: &str) -> ContentResult<String> {
        Ok(parent_id.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub id: String,
    pub position: i64,
}

pub fn next_position<S: OrderedScope + ?Sized>(
    conn: &Connection,
    scope: &S,
    parent_id: &str,
) -> ContentResult<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(position), ?) FROM {} WHERE {} = ?",
        scope.table(),
        scope.parent_column()
    );
    let max: i64 = conn.query_row(&sql, params![FIRST_POSITION - 1, parent_id], |r| {
        r.get(0)
    })?;
    Ok(max.max(FIRST_POSITION - 1) + 1)
}

/// Applies `entries` to the children of `parent_id` as one transaction.
///
/// Siblings not named in `entries` keep their positions; the resulting set
/// must still be a total order. Returns the sibling ids in final order.
pub fn reorder_siblings<S: OrderedScope + ?Sized>(
    conn: &Connection,
    scope: &S,
    user_id: &str,
    parent_id: &str,
    entries: &[ReorderEntry],
) -> ContentResult<Vec<ReorderEntry>> {
    check_entries(entries)?;

    let tx = immediate(conn)?;
    if scope.parent_owner(&tx, parent_id)? != user_id {
        return Err(ContentError::Forbidden {
            kind: scope.label(),
            id: parent_id.to_string(),
        });
    }

    let existing = sibling_positions(&tx, scope, parent_id)?;
    let mut reasons: Vec<String> = entries
        .iter()
        .filter(|e| !existing.contains_key(&e.id))
        .map(|e| format!("not_a_child:{}", e.id))
        .collect();
    if !reasons.is_empty() {
        return Err(ContentError::invalid_with(
            format!("{} ids do not belong to {}", scope.label(), parent_id),
            reasons,
        ));
    }

    let mut final_positions = existing;
    for e in entries {
        final_positions.insert(e.id.clone(), e.position);
    }
    let mut seen = HashSet::new();
    let mut by_position: Vec<_> = final_positions.iter().collect();
    by_position.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
    for (_, pos) in &by_position {
        if !seen.insert(**pos) {
            reasons.push(format!("duplicate_position:{}", pos));
        }
    }
    if !reasons.is_empty() {
        reasons.dedup();
        return Err(ContentError::invalid_with(
            "reorder would leave siblings sharing a position",
            reasons,
        ));
    }

    // Park moved rows at unique negative slots first so UNIQUE(parent, position)
    // never sees a transient duplicate.
    let park_sql = format!(
        "UPDATE {} SET position = ? WHERE {} = ? AND id = ?",
        scope.table(),
        scope.parent_column()
    );
    for (idx, e) in entries.iter().enumerate() {
        tx.execute(&park_sql, params![-(idx as i64) - 1, parent_id, e.id])
            .map_err(ContentError::from_write)?;
    }

    let ts = now_ts();
    let place_sql = format!(
        "UPDATE {} SET position = ?, updated_at = ? WHERE {} = ? AND id = ?",
        scope.table(),
        scope.parent_column()
    );
    for e in entries {
        let placed = if scope.has_updated_at() {
            tx.execute(&place_sql, params![e.position, ts, parent_id, e.id])
        } else {
            tx.execute(&park_sql, params![e.position, parent_id, e.id])
        };
        placed.map_err(ContentError::from_write)?;
    }
    tx.commit().map_err(ContentError::from_write)?;

    tracing::info!(
        scope = scope.label(),
        parent_id,
        moved = entries.len(),
        "reordered siblings"
    );

    Ok(by_position
        .into_iter()
        .map(|(id, position)| ReorderEntry {
            id: id.clone(),
            position: *position,
        })
        .collect())
}

fn check_entries(entries: &[ReorderEntry]) -> ContentResult<()> {
    if entries.is_empty() {
        return Err(ContentError::invalid("reorder list must not be empty"));
    }
    let mut reasons = Vec::new();
    let mut ids = HashSet::new();
    for e in entries {
        if e.id.trim().is_empty() {
            reasons.push("empty_id".to_string());
        } else if !ids.insert(e.id.as_str()) {
            reasons.push(format!("duplicate_id:{}", e.id));
        }
        if e.position < 0 {
            reasons.push(format!("negative_position:{}", e.id));
        }
    }
    if !reasons.is_empty() {
        return Err(ContentError::invalid_with("malformed reorder list", reasons));
    }
    Ok(())
}

fn sibling_positions<S: OrderedScope + ?Sized>(
    conn: &Connection,
    scope: &S,
    parent_id: &str,
) -> ContentResult<HashMap<String, i64>> {
    let sql = format!(
        "SELECT id, position FROM {} WHERE {} = ?",
        scope.table(),
        scope.parent_column()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([parent_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::hierarchy::{create_child, create_root};
    use crate::db::open_in_memory;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().cloned().expect("object")
    }

    fn chapter_with_sections(conn: &Connection, n: usize) -> (String, Vec<String>) {
        let course = create_root(conn, "author", NodeKind::Course, &payload(json!({ "title": "C" })))
            .expect("course");
        let chapter = create_child(
            conn,
            "author",
            NodeKind::Chapter,
            course.id(),
            &payload(json!({ "title": "Ch" })),
        )
        .expect("chapter");
        let sections = (0..n)
            .map(|i| {
                create_child(
                    conn,
                    "author",
                    NodeKind::Section,
                    chapter.id(),
                    &payload(json!({ "title": format!("S{i}") })),
                )
                .expect("section")
                .id()
                .to_string()
            })
            .collect();
        (chapter.id().to_string(), sections)
    }

    fn positions(conn: &Connection, chapter_id: &str) -> Vec<(String, i64)> {
        let mut stmt = conn
            .prepare("SELECT id, position FROM sections WHERE chapter_id = ? ORDER BY position")
            .expect("prepare");
        stmt.query_map([chapter_id], |r| Ok((r.get(0)?, r.get(1)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect")
    }

    #[test]
    fn first_position_is_one_and_inserts_append() {
        let conn = open_in_memory();
        let (chapter_id, sections) = chapter_with_sections(&conn, 3);
        let got: Vec<i64> = positions(&conn, &chapter_id).into_iter().map(|p| p.1).collect();
        assert_eq!(got, vec![1, 2, 3]);
        assert_eq!(
            next_position(&conn, &ChildrenOf::new(NodeKind::Section).unwrap(), &chapter_id)
                .expect("next"),
            4
        );
        assert_eq!(sections.len(), 3);
    }

    #[test]
    fn reorder_swaps_and_is_idempotent() {
        let conn = open_in_memory();
        let (chapter_id, s) = chapter_with_sections(&conn, 3);
        let scope = ChildrenOf::new(NodeKind::Section).unwrap();
        let list = vec![
            ReorderEntry { id: s[2].clone(), position: 1 },
            ReorderEntry { id: s[0].clone(), position: 3 },
        ];
        reorder_siblings(&conn, &scope, "author", &chapter_id, &list).expect("reorder");
        let first = positions(&conn, &chapter_id);
        reorder_siblings(&conn, &scope, "author", &chapter_id, &list).expect("reorder again");
        let second = positions(&conn, &chapter_id);
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![(s[2].clone(), 1), (s[1].clone(), 2), (s[0].clone(), 3)]
        );
    }

    #[test]
    fn reorder_rejects_foreign_ids_without_partial_writes() {
        let conn = open_in_memory();
        let (chapter_id, s) = chapter_with_sections(&conn, 2);
        let (_, other) = chapter_with_sections(&conn, 1);
        let scope = ChildrenOf::new(NodeKind::Section).unwrap();
        let before = positions(&conn, &chapter_id);
        let err = reorder_siblings(
            &conn,
            &scope,
            "author",
            &chapter_id,
            &[
                ReorderEntry { id: s[0].clone(), position: 2 },
                ReorderEntry { id: s[1].clone(), position: 1 },
                ReorderEntry { id: other[0].clone(), position: 3 },
            ],
        )
        .expect_err("foreign id");
        assert_eq!(err.code(), "validation_failed");
        assert_eq!(positions(&conn, &chapter_id), before);
    }

    #[test]
    fn reorder_rejects_collisions_and_negative_positions() {
        let conn = open_in_memory();
        let (chapter_id, s) = chapter_with_sections(&conn, 3);
        let scope = ChildrenOf::new(NodeKind::Section).unwrap();
        let collide = reorder_siblings(
            &conn,
            &scope,
            "author",
            &chapter_id,
            &[ReorderEntry { id: s[0].clone(), position: 2 }],
        )
        .expect_err("collides with untouched sibling");
        assert_eq!(collide.code(), "validation_failed");

        let negative = reorder_siblings(
            &conn,
            &scope,
            "author",
            &chapter_id,
            &[ReorderEntry { id: s[0].clone(), position: -1 }],
        )
        .expect_err("negative");
        assert_eq!(negative.code(), "validation_failed");
    }

    #[test]
    fn reorder_requires_parent_owner() {
        let conn = open_in_memory();
        let (chapter_id, s) = chapter_with_sections(&conn, 2);
        let scope = ChildrenOf::new(NodeKind::Section).unwrap();
        let err = reorder_siblings(
            &conn,
            &scope,
            "intruder",
            &chapter_id,
            &[
                ReorderEntry { id: s[0].clone(), position: 2 },
                ReorderEntry { id: s[1].clone(), position: 1 },
            ],
        )
        .expect_err("forbidden");
        assert_eq!(err.code(), "forbidden");
    }

    #[test]
    fn reorder_against_a_held_write_lock_is_a_conflict() {
        let dir = std::env::temp_dir().join(format!("coursed-reorder-{}", uuid::Uuid::new_v4()));
        let holder = crate::db::open_db(&dir, std::time::Duration::from_millis(50)).expect("open holder");
        let writer = crate::db::open_db(&dir, std::time::Duration::from_millis(50)).expect("open writer");
        let (chapter_id, s) = chapter_with_sections(&holder, 2);
        let before = positions(&holder, &chapter_id);

        holder.execute_batch("BEGIN IMMEDIATE").expect("hold write lock");
        let scope = ChildrenOf::new(NodeKind::Section).unwrap();
        let err = reorder_siblings(
            &writer,
            &scope,
            "author",
            &chapter_id,
            &[
                ReorderEntry { id: s[0].clone(), position: 2 },
                ReorderEntry { id: s[1].clone(), position: 1 },
            ],
        )
        .expect_err("lock is held");
        assert_eq!(err.code(), "conflict");
        holder.execute_batch("ROLLBACK").expect("release");

        assert_eq!(positions(&writer, &chapter_id), before);
        drop((holder, writer));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn user_lists_are_owned_by_their_user() {
        let conn = open_in_memory();
        let err = reorder_siblings(
            &conn,
            &ProfileLinks,
            "alice",
            "bob",
            &[ReorderEntry { id: "x".into(), position: 1 }],
        )
        .expect_err("forbidden");
        assert_eq!(err.code(), "forbidden");
    }
}
