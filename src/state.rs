//! Per-host run state
//!
//! After each top-level task the runner writes the latest result for the host
//! to `<root>/<host>/last_run.json`, replacing the previous record.

use crate::error::{AncibleError, Result};
use crate::runner::ModuleResult;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Default state directory, relative to the working directory
pub const DEFAULT_STATE_DIR: &str = "runtime/state";

const STATE_FILE: &str = "last_run.json";

#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    task: &'a str,
    changed: bool,
    failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<&'a str>,
    command: CommandRecord,
}

#[derive(Debug, Serialize)]
struct CommandRecord {
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

/// Writes run records under a root directory
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StateStore { root: root.into() }
    }

    /// Path of the record file for `host`
    ///
    /// The host name must be a single plain path component, so records never
    /// land outside the state root.
    pub fn path_for(&self, host: &str) -> Result<PathBuf> {
        let mut components = Path::new(host).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == host => {
                Ok(self.root.join(host).join(STATE_FILE))
            }
            _ => Err(AncibleError::StatePath(host.to_string())),
        }
    }

    /// Persist `result` as the latest run of `task_name` on `host`
    pub fn save_result(&self, host: &str, task_name: &str, result: &ModuleResult) -> Result<PathBuf> {
        let command = match &result.command {
            Some(cmd) => CommandRecord {
                exit_code: cmd.exit_code,
                stdout: flatten_output(&cmd.stdout_lossy()),
                stderr: flatten_output(&cmd.stderr_lossy()),
            },
            None => CommandRecord {
                exit_code: 0,
                stdout: None,
                stderr: None,
            },
        };

        let record = RunRecord {
            task: task_name,
            changed: result.changed,
            failed: result.failed,
            msg: result.msg.as_deref(),
            command,
        };

        let path = self.path_for(host)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json)?;

        debug!(host, task = task_name, path = %path.display(), "saved run state");
        Ok(path)
    }
}

/// Output as a single line, or `None` when empty
fn flatten_output(output: &str) -> Option<String> {
    if output.is_empty() {
        return None;
    }
    Some(
        output
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect(),
    )
}
