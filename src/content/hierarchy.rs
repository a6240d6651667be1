//! Create, update and delete for every content kind, scoped by ownership.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::patch::{parse_assignments, Assignments};
use super::position::{next_position, ChildrenOf};
use super::publish::{missing_fields, reevaluate_parent, CascadeEffect};
use super::{ensure_owner, load_node, ItemKind, Node, NodeKind};
use crate::db::now_ts;
use crate::error::{ContentError, ContentResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub node: Node,
    pub cascade: Option<CascadeEffect>,
}

/// Takes the write lock up front. A writer that cannot get it within the
/// busy timeout gets `conflict`.
pub(crate) fn immediate(conn: &Connection) -> ContentResult<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(ContentError::from_write)
}

/// Creates a course or post owned by `user_id`.
pub fn create_root(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    payload: &Map<String, JsonValue>,
) -> ContentResult<Node> {
    if kind.parent().is_some() {
        return Err(ContentError::invalid(format!(
            "{} must be created under a parent",
            kind.label()
        )));
    }
    let assignments = parse_assignments(kind, payload, &[])?;
    require_title(kind, &assignments)?;
    check_category(conn, &assignments)?;

    let id = Uuid::new_v4().to_string();
    let ts = now_ts();
    let mut columns = vec!["id", "user_id", "is_published", "created_at", "updated_at"];
    let mut values = vec![
        Value::Text(id.clone()),
        Value::Text(user_id.to_string()),
        Value::Integer(0),
        Value::Text(ts.clone()),
        Value::Text(ts),
    ];
    columns.extend(assignments.columns);
    values.extend(assignments.values);
    insert_row(conn, kind.table(), &columns, values)?;

    tracing::info!(kind = kind.label(), id = %id, user_id, "created root node");
    load_node(conn, kind, &id)
}

/// Creates a draft child under `parent_id`, appended after its siblings.
pub fn create_child(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    parent_id: &str,
    payload: &Map<String, JsonValue>,
) -> ContentResult<Node> {
    let (Some(parent_kind), Some(scope)) = (kind.parent(), ChildrenOf::new(kind)) else {
        return Err(ContentError::invalid(format!(
            "{} has no parent",
            kind.label()
        )));
    };
    let item_kind = if kind == NodeKind::Item {
        Some(parse_item_kind(payload)?)
    } else {
        None
    };
    let assignments = parse_assignments(kind, payload, &["kind"])?;
    require_title(kind, &assignments)?;

    let tx = immediate(conn)?;
    ensure_owner(&tx, parent_kind, parent_id, user_id)?;
    let position = next_position(&tx, &scope, parent_id)?;

    let id = Uuid::new_v4().to_string();
    let ts = now_ts();
    let mut columns = vec![
        "id",
        scope_parent_column(kind),
        "position",
        "is_published",
        "created_at",
        "updated_at",
    ];
    let mut values = vec![
        Value::Text(id.clone()),
        Value::Text(parent_id.to_string()),
        Value::Integer(position),
        Value::Integer(0),
        Value::Text(ts.clone()),
        Value::Text(ts),
    ];
    if let Some(k) = item_kind {
        columns.push("kind");
        values.push(Value::Text(k.as_str().to_string()));
    }
    columns.extend(assignments.columns);
    values.extend(assignments.values);
    insert_row(&tx, kind.table(), &columns, values)?;
    let node = load_node(&tx, kind, &id)?;
    tx.commit()?;

    tracing::info!(
        kind = kind.label(),
        id = %id,
        parent_id,
        position,
        "created child node"
    );
    Ok(node)
}

/// Applies an allow-listed patch. The ownership predicate is part of the UPDATE.
pub fn update_node(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    id: &str,
    patch: &Map<String, JsonValue>,
) -> ContentResult<Node> {
    let assignments = parse_assignments(kind, patch, &[])?;

    let tx = immediate(conn)?;
    if assignments.is_empty() {
        ensure_owner(&tx, kind, id, user_id)?;
    } else {
        check_category(&tx, &assignments)?;
        let mut sets: Vec<String> = assignments
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect();
        sets.push("updated_at = ?".to_string());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? AND {} = ?",
            kind.table(),
            sets.join(", "),
            kind.owner_expr()
        );
        let mut values = assignments.values;
        values.push(Value::Text(now_ts()));
        values.push(Value::Text(id.to_string()));
        values.push(Value::Text(user_id.to_string()));
        let changed = tx
            .execute(&sql, params_from_iter(values))
            .map_err(ContentError::from_write)?;
        if changed == 0 {
            // Tells a missing node apart from someone else's.
            ensure_owner(&tx, kind, id, user_id)?;
        }
    }
    let node = load_node(&tx, kind, id)?;
    if node.is_published() {
        let missing = missing_fields(&node);
        if !missing.is_empty() {
            return Err(ContentError::invalid_with(
                format!("cannot leave published {} incomplete", kind.label()),
                missing.into_iter().map(str::to_string).collect(),
            ));
        }
    }
    tx.commit()?;
    Ok(node)
}

/// Deletes a node and, through foreign keys, all of its descendants.
pub fn delete_node(
    conn: &Connection,
    user_id: &str,
    kind: NodeKind,
    id: &str,
) -> ContentResult<Deleted> {
    let tx = immediate(conn)?;
    let node = load_node(&tx, kind, id)?;
    ensure_owner(&tx, kind, id, user_id)?;
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    tx.execute(&sql, [id]).map_err(ContentError::from_write)?;
    let cascade = match node.parent_id() {
        Some(parent_id) => reevaluate_parent(&tx, kind, parent_id)?,
        None => None,
    };
    tx.commit()?;

    tracing::info!(kind = kind.label(), id, "deleted node");
    Ok(Deleted { node, cascade })
}

fn scope_parent_column(kind: NodeKind) -> &'static str {
    kind.parent_column().unwrap_or("parent_id")
}

fn parse_item_kind(payload: &Map<String, JsonValue>) -> ContentResult<ItemKind> {
    let raw = payload.get("kind").and_then(|v| v.as_str()).unwrap_or("");
    ItemKind::parse(raw).ok_or_else(|| {
        ContentError::invalid_with(
            "item kind must be one of: video, blog, article, note, codeExplanation",
            vec![if raw.is_empty() {
                "missing_field:kind".to_string()
            } else {
                format!("unknown_item_kind:{}", raw)
            }],
        )
    })
}

fn require_title(kind: NodeKind, assignments: &Assignments) -> ContentResult<()> {
    if assignments.text("title").is_none() {
        return Err(ContentError::invalid_with(
            format!("{} title is required", kind.label()),
            vec!["missing_field:title".to_string()],
        ));
    }
    Ok(())
}

fn check_category(conn: &Connection, assignments: &Assignments) -> ContentResult<()> {
    let Some(category_id) = assignments.text("category_id") else {
        return Ok(());
    };
    let exists = conn
        .query_row("SELECT 1 FROM categories WHERE id = ?", [category_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        return Err(ContentError::invalid_with(
            "category does not exist",
            vec![format!("unknown_category:{}", category_id)],
        ));
    }
    Ok(())
}

fn insert_row(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    values: Vec<Value>,
) -> ContentResult<()> {
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {}({}) VALUES({})",
        table,
        columns.join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(values))
        .map_err(ContentError::from_write)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::publish::set_published;
    use crate::content::{find_node, list_children};
    use crate::db::open_in_memory;
    use serde_json::json;

    fn obj(v: JsonValue) -> Map<String, JsonValue> {
        v.as_object().cloned().expect("object")
    }

    fn reasons(e: ContentError) -> Vec<String> {
        match e {
            ContentError::Validation { reasons, .. } => reasons,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn course(conn: &Connection) -> Node {
        create_root(conn, "author", NodeKind::Course, &obj(json!({ "title": "Rust 101" })))
            .expect("course")
    }

    #[test]
    fn children_start_as_drafts_with_increasing_positions() {
        let conn = open_in_memory();
        let c = course(&conn);
        let a = create_child(&conn, "author", NodeKind::Chapter, c.id(), &obj(json!({ "title": "A" })))
            .expect("a");
        let b = create_child(&conn, "author", NodeKind::Chapter, c.id(), &obj(json!({ "title": "B" })))
            .expect("b");
        match (&a, &b) {
            (Node::Chapter(a), Node::Chapter(b)) => {
                assert_eq!((a.position, b.position), (1, 2));
                assert!(!a.is_published && !b.is_published);
            }
            other => panic!("unexpected nodes: {other:?}"),
        }
    }

    #[test]
    fn create_child_checks_parent_and_owner() {
        let conn = open_in_memory();
        let c = course(&conn);
        let missing = create_child(&conn, "author", NodeKind::Chapter, "nope", &obj(json!({ "title": "A" })))
            .expect_err("missing parent");
        assert_eq!(missing.code(), "not_found");
        let forbidden = create_child(&conn, "other", NodeKind::Chapter, c.id(), &obj(json!({ "title": "A" })))
            .expect_err("not owner");
        assert_eq!(forbidden.code(), "forbidden");
        let untitled = create_child(&conn, "author", NodeKind::Chapter, c.id(), &obj(json!({})))
            .expect_err("title required");
        assert_eq!(untitled.code(), "validation_failed");
    }

    #[test]
    fn items_need_a_known_kind() {
        let conn = open_in_memory();
        let c = course(&conn);
        let ch = create_child(&conn, "author", NodeKind::Chapter, c.id(), &obj(json!({ "title": "A" })))
            .expect("chapter");
        let s = create_child(&conn, "author", NodeKind::Section, ch.id(), &obj(json!({ "title": "S" })))
            .expect("section");
        let bad = create_child(&conn, "author", NodeKind::Item, s.id(), &obj(json!({ "title": "x", "kind": "podcast" })))
            .expect_err("bad kind");
        assert_eq!(bad.code(), "validation_failed");
        let note = create_child(
            &conn,
            "author",
            NodeKind::Item,
            s.id(),
            &obj(json!({ "title": "x", "kind": "codeExplanation", "language": "rust" })),
        )
        .expect("item");
        match note {
            Node::Item(i) => {
                assert_eq!(i.kind, ItemKind::CodeExplanation);
                assert_eq!(i.language.as_deref(), Some("rust"));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn update_is_owner_scoped() {
        let conn = open_in_memory();
        let c = course(&conn);
        let e = update_node(&conn, "other", NodeKind::Course, c.id(), &obj(json!({ "title": "Hijack" })))
            .expect_err("forbidden");
        assert_eq!(e.code(), "forbidden");
        let e = update_node(&conn, "author", NodeKind::Course, "missing", &obj(json!({ "title": "X" })))
            .expect_err("missing");
        assert_eq!(e.code(), "not_found");
        let updated = update_node(
            &conn,
            "author",
            NodeKind::Course,
            c.id(),
            &obj(json!({ "title": "Rust 102", "price": 10.0 })),
        )
        .expect("update");
        match updated {
            Node::Course(c) => {
                assert_eq!(c.title, "Rust 102");
                assert_eq!(c.price, Some(10.0));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn published_nodes_keep_their_required_fields() {
        let conn = open_in_memory();
        let c = course(&conn);
        let ch = create_child(
            &conn,
            "author",
            NodeKind::Chapter,
            c.id(),
            &obj(json!({ "title": "Ch", "description": "d" })),
        )
        .expect("chapter");
        let s = create_child(
            &conn,
            "author",
            NodeKind::Section,
            ch.id(),
            &obj(json!({ "title": "S", "videoUrl": "https://v" })),
        )
        .expect("section");
        set_published(&conn, "author", NodeKind::Section, s.id(), true).expect("publish section");
        set_published(&conn, "author", NodeKind::Chapter, ch.id(), true).expect("publish chapter");

        let e = update_node(&conn, "author", NodeKind::Section, s.id(), &obj(json!({ "videoUrl": null })))
            .expect_err("section loses video");
        assert_eq!(e.code(), "validation_failed");
        assert_eq!(reasons(e), vec!["missing_video_url".to_string()]);
        let e = update_node(&conn, "author", NodeKind::Chapter, ch.id(), &obj(json!({ "description": " " })))
            .expect_err("chapter loses description");
        assert_eq!(reasons(e), vec!["missing_description".to_string()]);

        match load_node(&conn, NodeKind::Section, s.id()).expect("section") {
            Node::Section(s) => assert_eq!(s.video_url.as_deref(), Some("https://v")),
            other => panic!("unexpected node: {other:?}"),
        }

        // Drafts may be edited freely.
        set_published(&conn, "author", NodeKind::Section, s.id(), false).expect("unpublish");
        update_node(&conn, "author", NodeKind::Section, s.id(), &obj(json!({ "videoUrl": null })))
            .expect("draft edit");
    }

    #[test]
    fn unknown_category_is_rejected() {
        let conn = open_in_memory();
        let c = course(&conn);
        let e = update_node(&conn, "author", NodeKind::Course, c.id(), &obj(json!({ "categoryId": "ghost" })))
            .expect_err("unknown category");
        assert_eq!(e.code(), "validation_failed");
    }

    #[test]
    fn delete_cascades_to_descendants() {
        let conn = open_in_memory();
        let c = course(&conn);
        let ch = create_child(&conn, "author", NodeKind::Chapter, c.id(), &obj(json!({ "title": "A" })))
            .expect("chapter");
        let s = create_child(&conn, "author", NodeKind::Section, ch.id(), &obj(json!({ "title": "S" })))
            .expect("section");
        let e = delete_node(&conn, "other", NodeKind::Course, c.id()).expect_err("forbidden");
        assert_eq!(e.code(), "forbidden");

        delete_node(&conn, "author", NodeKind::Course, c.id()).expect("delete");
        assert!(find_node(&conn, NodeKind::Chapter, ch.id()).expect("query").is_none());
        assert!(find_node(&conn, NodeKind::Section, s.id()).expect("query").is_none());
        assert!(list_children(&conn, NodeKind::Chapter, c.id(), false)
            .expect("list")
            .is_empty());
    }
}
