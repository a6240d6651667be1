use crate::content::progress::{
    course_completion_percentage, dashboard, mark_progress, record_purchase,
};
use crate::ipc::error::{content_err, err, ok, ok_value};
use crate::ipc::helpers::{db_conn, parse_bool, parse_opt_string, require_user, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Written by the payment collaborator on a successful checkout.
fn handle_purchases_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match record_purchase(conn, &user, &course_id) {
        Ok(p) => ok_value(&req.id, &req.method, &p),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_progress_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section_id = match parse_opt_string(req.params.get("sectionId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("sectionId {}", m), None),
    };
    let completed = match parse_bool(req.params.get("isCompleted"), true) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("isCompleted {}", m), None),
    };
    match mark_progress(conn, &user, &chapter_id, section_id.as_deref(), completed) {
        Ok(row) => ok_value(&req.id, &req.method, &row),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_progress_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match course_completion_percentage(conn, &user, &course_id) {
        Ok(pct) => ok(&req.id, json!({ "courseId": course_id, "percentage": pct })),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

fn handle_progress_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match require_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match dashboard(conn, &user) {
        Ok(d) => ok_value(&req.id, &req.method, &d),
        Err(e) => content_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "purchases.record" => Some(handle_purchases_record(state, req)),
        "progress.mark" => Some(handle_progress_mark(state, req)),
        "progress.course" => Some(handle_progress_course(state, req)),
        "progress.dashboard" => Some(handle_progress_dashboard(state, req)),
        _ => None,
    }
}
