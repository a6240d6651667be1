//! Sidecar configuration: an optional TOML file overridden by CLI flags.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace opened at startup. Without one the host must call
    /// `workspace.select` first.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// How long a write waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_log_filter() -> String {
    "coursed=info".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: default_log_filter(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
