use rusqlite::Connection;
use serde_json::{Map, Value as JsonValue};

use crate::content::position::ReorderEntry;
use crate::error::ContentError;
use crate::ipc::error::{content_err, err};
use crate::ipc::types::{AppState, Request};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Caller identity; every mutation needs one.
pub fn require_user(req: &Request) -> Result<String, serde_json::Value> {
    req.user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| content_err(&req.id, &req.method, &ContentError::Unauthenticated))
}

pub fn viewer(req: &Request) -> Option<&str> {
    req.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

pub fn object_param<'a>(req: &'a Request, key: &str) -> Result<&'a Map<String, JsonValue>, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_object())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Reads `params.list` as `[{id, position}]`. Semantic checks happen in the store.
pub fn parse_reorder_list(req: &Request) -> Result<Vec<ReorderEntry>, serde_json::Value> {
    let Some(raw) = req.params.get("list") else {
        return Err(err(&req.id, "bad_params", "missing list", None));
    };
    serde_json::from_value::<Vec<ReorderEntry>>(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("list must be [{{id, position}}]: {}", e),
            None,
        )
    })
}
