use serde_json::json;

use crate::error::ContentError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a domain error onto the wire envelope. Storage failures are logged
/// under `op` and reported with a generic message.
pub fn content_err(id: &str, op: &str, e: &ContentError) -> serde_json::Value {
    let status = e.http_status();
    match e {
        ContentError::Database(inner) => {
            tracing::error!(op, error = %inner, "storage failure");
            err(
                id,
                e.code(),
                "internal storage error",
                Some(json!({ "status": status })),
            )
        }
        ContentError::Validation { message, reasons } => {
            tracing::debug!(op, %message, ?reasons, "validation failed");
            err(
                id,
                e.code(),
                message.clone(),
                Some(json!({ "status": status, "reasons": reasons })),
            )
        }
        _ => {
            tracing::debug!(op, error = %e, "request rejected");
            err(id, e.code(), e.to_string(), Some(json!({ "status": status })))
        }
    }
}

/// Serializes a domain value into an `ok` envelope.
pub fn ok_value<T: serde::Serialize>(id: &str, op: &str, value: &T) -> serde_json::Value {
    match serde_json::to_value(value) {
        Ok(v) => ok(id, v),
        Err(e) => {
            tracing::error!(op, error = %e, "response serialization failed");
            err(id, "internal", "failed to encode response", None)
        }
    }
}
