mod backup;
mod config;
mod content;
mod db;
mod error;
mod ipc;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Course content sidecar speaking newline-delimited JSON on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "coursed", version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "COURSED_CONFIG")]
    config: Option<PathBuf>,

    /// Workspace directory to open at startup
    #[arg(long, env = "COURSED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "COURSED_LOG_FILTER")]
    log_filter: Option<String>,

    /// SQLite busy timeout in milliseconds
    #[arg(long, env = "COURSED_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(ws) = args.workspace {
        config.workspace = Some(ws);
    }
    if let Some(filter) = args.log_filter {
        config.log_filter = filter;
    }
    if let Some(ms) = args.busy_timeout_ms {
        config.busy_timeout_ms = ms;
    }

    // stdout carries the protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut state = ipc::AppState::new(config.busy_timeout());
    if let Some(ws) = &config.workspace {
        let conn = db::open_db(ws, config.busy_timeout())
            .with_context(|| format!("failed to open workspace {}", ws.display()))?;
        state.workspace = Some(ws.clone());
        state.db = Some(conn);
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workspace = ?config.workspace,
        busy_timeout_ms = config.busy_timeout_ms,
        "coursed ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                tracing::warn!(error = %e, "malformed request line");
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    Ok(())
}
