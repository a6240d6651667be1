#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_coursed");
    let mut child = Command::new(exe)
        .env_remove("COURSED_WORKSPACE")
        .env_remove("COURSED_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn coursed");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// Sends one request and returns the whole response envelope. An empty
/// `user` sends the request anonymously.
pub fn request_as(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    user: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let mut payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if !user.is_empty() {
        payload["userId"] = json!(user);
    }
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    request_as(stdin, reader, id, "", method, params)
}

pub fn request_ok_as(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    user: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request_as(stdin, reader, id, user, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    request_ok_as(stdin, reader, id, "", method, params)
}

/// Error code of a failed response; panics when the request succeeded.
pub fn error_code(resp: &serde_json::Value) -> String {
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected failure: {}",
        resp
    );
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

pub fn error_reasons(resp: &serde_json::Value) -> Vec<String> {
    resp.get("error")
        .and_then(|e| e.get("details"))
        .and_then(|d| d.get("reasons"))
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}
