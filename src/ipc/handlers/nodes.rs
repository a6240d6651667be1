//! `<family>.<action>` methods shared by every content kind.

use crate::content::catalog::list_section_items;
use crate::content::hierarchy::{create_child, create_root, delete_node, update_node};
use crate::content::position::{reorder_siblings, ChildrenOf};
use crate::content::publish::{set_published, toggle_published};
use crate::content::NodeKind;
use crate::ipc::error::{content_err, err, ok, ok_value};
use crate::ipc::helpers::{
    db_conn, object_param, parse_bool, parse_reorder_list, require_user, required_str, viewer,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parent_id(req: &Request, kind: NodeKind) -> Result<String, serde_json::Value> {
    match kind.parent_param() {
        Some(key) => required_str(req, key),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("{} has no parent", kind.label()),
            None,
        )),
    }
}

fn handle_create(state: &mut AppState, req: &Request, kind: NodeKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match object_param(req, "data") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let created = if kind.parent().is_some() {
        let parent = match parent_id(req, kind) {
            Ok(v) => v,
            Err(e) => return e,
        };
        create_child(conn, &user, kind, &parent, data)
    } else {
        create_root(conn, &user, kind, data)
    };
    match created {
        Ok(node) => ok_value(&req.id, &req.method, &node),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_update(state: &mut AppState, req: &Request, kind: NodeKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, kind.id_param()) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match object_param(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match update_node(conn, &user, kind, &id, patch) {
        Ok(node) => ok_value(&req.id, &req.method, &node),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request, kind: NodeKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, kind.id_param()) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match delete_node(conn, &user, kind, &id) {
        Ok(deleted) => ok_value(&req.id, &req.method, &deleted),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_publish(
    state: &mut AppState,
    req: &Request,
    kind: NodeKind,
    toggle: bool,
) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, kind.id_param()) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let outcome = if toggle {
        toggle_published(conn, &user, kind, &id)
    } else {
        match parse_bool(req.params.get("isPublished"), true) {
            Ok(desired) => set_published(conn, &user, kind, &id, desired),
            Err(m) => return err(&req.id, "bad_params", format!("isPublished {}", m), None),
        }
    };
    match outcome {
        Ok(outcome) => ok_value(&req.id, &req.method, &outcome),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_reorder(state: &mut AppState, req: &Request, kind: NodeKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(scope) = ChildrenOf::new(kind) else {
        return err(
            &req.id,
            "bad_params",
            format!("{} is not ordered", kind.label()),
            None,
        );
    };
    let parent = match parent_id(req, kind) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let list = match parse_reorder_list(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reorder_siblings(conn, &scope, &user, &parent, &list) {
        Ok(order) => ok(&req.id, json!({ "order": order })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

/// Items of one section, filtered and redacted for the caller.
fn handle_list_items(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section = match parent_id(req, NodeKind::Item) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match list_section_items(conn, &section, viewer(req)) {
        Ok(items) => ok(&req.id, json!({ "items": items })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (family, action) = req.method.split_once('.')?;
    let kind = NodeKind::from_family(family)?;
    let ordered = kind.parent().is_some();
    match action {
        "create" => Some(handle_create(state, req, kind)),
        "update" => Some(handle_update(state, req, kind)),
        "delete" => Some(handle_delete(state, req, kind)),
        "publish" => Some(handle_publish(state, req, kind, false)),
        "togglePublish" if kind == NodeKind::Chapter => Some(handle_publish(state, req, kind, true)),
        "reorder" if ordered => Some(handle_reorder(state, req, kind)),
        "list" if kind == NodeKind::Item => Some(handle_list_items(state, req)),
        _ => None,
    }
}
