use crate::content::catalog::{
    course_tree, create_category, list_categories, list_courses, post_tree, CourseFilter,
};
use crate::ipc::error::{content_err, err, ok, ok_value};
use crate::ipc::helpers::{db_conn, parse_opt_string, require_user, required_str, viewer};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_categories_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match list_categories(conn) {
        Ok(rows) => ok(&req.id, json!({ "categories": rows })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_categories_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = require_user(req) {
        return e;
    }
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match create_category(conn, &name) {
        Ok(cat) => ok_value(&req.id, &req.method, &cat),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

/// The caller's own courses, drafts included.
fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filter = CourseFilter {
        owner: Some(user.clone()),
        ..Default::default()
    };
    match list_courses(conn, &filter, Some(&user)) {
        Ok(rows) => ok(&req.id, json!({ "courses": rows })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_courses_browse(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let title = match parse_opt_string(req.params.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("title {}", m), None),
    };
    let category_id = match parse_opt_string(req.params.get("categoryId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("categoryId {}", m), None),
    };
    let filter = CourseFilter {
        owner: None,
        title_contains: title,
        category_id,
    };
    match list_courses(conn, &filter, viewer(req)) {
        Ok(rows) => ok(&req.id, json!({ "courses": rows })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_courses_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match course_tree(conn, &course_id, viewer(req)) {
        Ok(tree) => ok_value(&req.id, &req.method, &tree),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_posts_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let post_id = match required_str(req, "postId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match post_tree(conn, &post_id, viewer(req)) {
        Ok(tree) => ok_value(&req.id, &req.method, &tree),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "categories.list" => Some(handle_categories_list(state, req)),
        "categories.create" => Some(handle_categories_create(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.browse" => Some(handle_courses_browse(state, req)),
        "courses.open" => Some(handle_courses_open(state, req)),
        "posts.open" => Some(handle_posts_open(state, req)),
        _ => None,
    }
}
