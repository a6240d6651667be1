//! Publish guards and the one-level unpublish cascade.
//!
//! Every publishable node is either draft or published. Publishing is guarded
//! by `can_publish`; unpublishing always succeeds and re-checks exactly the
//! immediate parent, which drops to draft once it has no published children.
//! A parent forced to draft this way does not re-check its own parent.

use rusqlite::{params, Connection};
use serde::Serialize;

use super::hierarchy::immediate;
use super::{ensure_owner, load_node, Node, NodeKind};
use crate::db::now_ts;
use crate::error::{ContentError, ContentResult};

pub const MISSING_TITLE: &str = "missing_title";
pub const MISSING_DESCRIPTION: &str = "missing_description";
pub const MISSING_VIDEO_URL: &str = "missing_video_url";
pub const MISSING_IMAGE_URL: &str = "missing_image_url";
pub const MISSING_CATEGORY: &str = "missing_category";
pub const MISSING_URL: &str = "missing_url";
pub const NO_PUBLISHED_CHAPTERS: &str = "no_published_chapters";

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishCheck {
    pub missing: Vec<&'static str>,
}

impl PublishCheck {
    pub fn is_publishable(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A parent that was pushed back to draft by a child change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeEffect {
    pub kind: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub node: Node,
    pub cascade: Option<CascadeEffect>,
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Field requirements that can be read off the node alone.
pub fn missing_fields(node: &Node) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let mut need = |cond: bool, reason: &'static str| {
        if cond {
            missing.push(reason);
        }
    };
    match node {
        Node::Course(c) => {
            need(c.title.trim().is_empty(), MISSING_TITLE);
            need(blank(&c.description), MISSING_DESCRIPTION);
            need(blank(&c.image_url), MISSING_IMAGE_URL);
            need(blank(&c.category_id), MISSING_CATEGORY);
        }
        Node::Chapter(c) => {
            need(c.title.trim().is_empty(), MISSING_TITLE);
            need(blank(&c.description), MISSING_DESCRIPTION);
        }
        Node::Section(s) => {
            need(s.title.trim().is_empty(), MISSING_TITLE);
            need(blank(&s.video_url), MISSING_VIDEO_URL);
        }
        Node::Item(i) => {
            need(i.title.trim().is_empty(), MISSING_TITLE);
            need(
                i.kind == super::ItemKind::Video && blank(&i.url),
                MISSING_URL,
            );
        }
        Node::Post(p) => {
            need(p.title.trim().is_empty(), MISSING_TITLE);
            need(blank(&p.description), MISSING_DESCRIPTION);
            need(blank(&p.image_url), MISSING_IMAGE_URL);
            need(blank(&p.category_id), MISSING_CATEGORY);
        }
        Node::PostChapter(c) => {
            need(c.title.trim().is_empty(), MISSING_TITLE);
            need(blank(&c.description), MISSING_DESCRIPTION);
        }
    }
    missing
}

/// Full publish predicate: field requirements plus, for roots, a published child.
pub fn can_publish(conn: &Connection, node: &Node) -> ContentResult<PublishCheck> {
    let mut missing = missing_fields(node);
    let child_kind = match node.kind() {
        NodeKind::Course => Some(NodeKind::Chapter),
        NodeKind::Post => Some(NodeKind::PostChapter),
        _ => None,
    };
    if let Some(child) = child_kind {
        if published_children(conn, child, node.id())? == 0 {
            missing.push(NO_PUBLISHED_CHAPTERS);
        }
    }
    Ok(PublishCheck { missing })
}

/// Sets the publish state of a node owned by `user_id`.
pub fn set_published(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    id: &str,
    desired: bool,
) -> ContentResult<PublishOutcome> {
    apply_published(conn, user_id, kind, id, |_| desired)
}

/// Flips the publish state. The current state is read inside the same
/// transaction as the write.
pub fn toggle_published(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    id: &str,
) -> ContentResult<PublishOutcome> {
    apply_published(conn, user_id, kind, id, |node| !node.is_published())
}

fn apply_published(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    id: &str,
    decide: impl FnOnce(&Node) -> bool,
) -> ContentResult<PublishOutcome> {
    let tx = immediate(conn)?;
    let node = load_node(&tx, kind, id)?;
    ensure_owner(&tx, kind, id, user_id)?;
    let desired = decide(&node);

    if desired {
        let check = can_publish(&tx, &node)?;
        if !check.is_publishable() {
            tracing::warn!(
                kind = kind.label(),
                id,
                missing = ?check.missing,
                "publish rejected"
            );
            return Err(ContentError::invalid_with(
                format!(
                    "cannot publish {}: {}",
                    kind.label(),
                    check.missing.join(", ")
                ),
                check.missing.iter().map(|m| m.to_string()).collect(),
            ));
        }
    }

    write_published(&tx, kind, id, desired)?;
    let cascade = match (desired, node.parent_id()) {
        (false, Some(parent_id)) => reevaluate_parent(&tx, kind, parent_id)?,
        _ => None,
    };
    let node = load_node(&tx, kind, id)?;
    tx.commit()?;

    tracing::info!(kind = kind.label(), id, published = desired, "publish state set");
    Ok(PublishOutcome { node, cascade })
}

/// Forces the immediate parent of a `child_kind` node to draft when none of
/// its children remain published. Does not look further up.
pub fn reevaluate_parent(
    conn: &Connection,
    child_kind: NodeKind,
    parent_id: &str,
) -> ContentResult<Option<CascadeEffect>> {
    let Some(parent_kind) = gated_parent(child_kind) else {
        return Ok(None);
    };
    if published_children(conn, child_kind, parent_id)? > 0 {
        return Ok(None);
    }
    let sql = format!(
        "UPDATE {} SET is_published = 0, updated_at = ? WHERE id = ? AND is_published = 1",
        parent_kind.table()
    );
    let changed = conn.execute(&sql, params![now_ts(), parent_id])?;
    if changed == 0 {
        return Ok(None);
    }
    tracing::info!(
        kind = parent_kind.label(),
        id = parent_id,
        "parent forced to draft: no published children left"
    );
    Ok(Some(CascadeEffect {
        kind: parent_kind.label(),
        id: parent_id.to_string(),
    }))
}

/// Parents whose publish state depends on their children.
fn gated_parent(child: NodeKind) -> Option<NodeKind> {
    match child {
        NodeKind::Section => Some(NodeKind::Chapter),
        NodeKind::Chapter => Some(NodeKind::Course),
        NodeKind::PostChapter => Some(NodeKind::Post),
        _ => None,
    }
}

fn published_children(conn: &Connection, child: NodeKind, parent_id: &str) -> ContentResult<i64> {
    let Some(parent_col) = child.parent_column() else {
        return Ok(0);
    };
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ? AND is_published = 1",
        child.table(),
        parent_col
    );
    Ok(conn.query_row(&sql, [parent_id], |r| r.get(0))?)
}

fn write_published(conn: &Connection, kind: NodeKind, id: &str, published: bool) -> ContentResult<()> {
    let sql = format!(
        "UPDATE {} SET is_published = ?, updated_at = ? WHERE id = ?",
        kind.table()
    );
    conn.execute(&sql, params![i64::from(published), now_ts(), id])?;
    Ok(())
}
