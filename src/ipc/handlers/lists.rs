use crate::content::lists::{
    add_favorite, add_profile_link, list_favorites, list_profile_links, remove_favorite,
    remove_profile_link,
};
use crate::content::position::{reorder_siblings, FavoriteVideos, OrderedScope, ProfileLinks};
use crate::error::ContentError;
use crate::ipc::error::{content_err, ok, ok_value};
use crate::ipc::helpers::{db_conn, parse_reorder_list, require_user, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Lists belong to `params.userId` when given, the caller otherwise. Only the
/// owner may change them.
fn target_user(req: &Request, caller: &str, scope: &dyn OrderedScope) -> Result<String, serde_json::Value> {
    let target = req
        .params
        .get("userId")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(caller);
    if target != caller {
        let e = ContentError::Forbidden {
            kind: scope.label(),
            id: target.to_string(),
        };
        return Err(content_err(&req.id, &req.method, &e));
    }
    Ok(target.to_string())
}

fn handle_favorites_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req).and_then(|u| target_user(req, &u, &FavoriteVideos)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let video_id = match required_str(req, "videoId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match add_favorite(conn, &user, &video_id) {
        Ok(fav) => ok_value(&req.id, &req.method, &fav),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_favorites_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req).and_then(|u| target_user(req, &u, &FavoriteVideos)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let favorite_id = match required_str(req, "favoriteId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match remove_favorite(conn, &user, &favorite_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_favorites_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req).and_then(|u| target_user(req, &u, &FavoriteVideos)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match list_favorites(conn, &user) {
        Ok(rows) => ok(&req.id, json!({ "favorites": rows })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_reorder(state: &mut AppState, req: &Request, scope: &dyn OrderedScope) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let caller = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let owner = req
        .params
        .get("userId")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&caller)
        .to_string();
    let list = match parse_reorder_list(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reorder_siblings(conn, scope, &caller, &owner, &list) {
        Ok(order) => ok(&req.id, json!({ "order": order })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_links_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req).and_then(|u| target_user(req, &u, &ProfileLinks)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let label = req.params.get("label").and_then(|v| v.as_str()).unwrap_or("");
    let url = req.params.get("url").and_then(|v| v.as_str()).unwrap_or("");
    match add_profile_link(conn, &user, label, url) {
        Ok(link) => ok_value(&req.id, &req.method, &link),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_links_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req).and_then(|u| target_user(req, &u, &ProfileLinks)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let link_id = match required_str(req, "linkId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match remove_profile_link(conn, &user, &link_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

/// Profile links are public; no caller identity needed.
fn handle_links_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match required_str(req, "userId").or_else(|_| require_user(req)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match list_profile_links(conn, &user) {
        Ok(rows) => ok(&req.id, json!({ "links": rows })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "favorites.add" => Some(handle_favorites_add(state, req)),
        "favorites.remove" => Some(handle_favorites_remove(state, req)),
        "favorites.list" => Some(handle_favorites_list(state, req)),
        "favorites.reorder" => Some(handle_reorder(state, req, &FavoriteVideos)),
        "profileLinks.add" => Some(handle_links_add(state, req)),
        "profileLinks.remove" => Some(handle_links_remove(state, req)),
        "profileLinks.list" => Some(handle_links_list(state, req)),
        "profileLinks.reorder" => Some(handle_reorder(state, req, &ProfileLinks)),
        _ => None,
    }
}
