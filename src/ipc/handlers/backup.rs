use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_user;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn path_param(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn handle_export_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_user(req) {
        return e;
    }
    let out_path = match path_param(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(FULL)") {
            tracing::warn!(error = %e, "checkpoint before export failed");
        }
    }

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, db::DB_FILE_NAME, &out) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = ?e, path = %out_path, "workspace export failed");
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            );
        }
    };
    tracing::info!(path = %out_path, sha256 = %export.db_sha256, "workspace exported");

    ok(
        &req.id,
        json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256,
        }),
    )
}

fn handle_import_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_user(req) {
        return e;
    }
    let in_path = match path_param(req, "inPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_path = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // The open handle must be released before the file is replaced.
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path, db::DB_FILE_NAME) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = ?e, path = %in_path, "workspace import failed");
            if let Some(ws) = state.workspace.clone() {
                match db::open_db(&ws, state.busy_timeout) {
                    Ok(conn) => state.db = Some(conn),
                    Err(reopen) => tracing::error!(error = ?reopen, "workspace reopen failed"),
                }
            }
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": in_path })),
            );
        }
    };

    match db::open_db(&workspace_path, state.busy_timeout) {
        Ok(conn) => {
            tracing::info!(
                workspace = %workspace_path.display(),
                format = %import.bundle_format_detected,
                "workspace imported"
            );
            state.workspace = Some(workspace_path.clone());
            state.db = Some(conn);
            ok(
                &req.id,
                json!({
                    "workspacePath": workspace_path.to_string_lossy(),
                    "bundleFormatDetected": import.bundle_format_detected
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspace" => Some(handle_export_workspace(state, req)),
        "backup.importWorkspace" => Some(handle_import_workspace(state, req)),
        _ => None,
    }
}
