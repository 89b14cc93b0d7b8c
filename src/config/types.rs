//! Playbook definition types
//!
//! These mirror the YAML layout of an Ansible-style playbook. They are
//! lowered into a [`TaskGraph`](crate::runner::TaskGraph) before execution.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;

/// A play: a host pattern plus the tasks to run on it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Play {
    /// Play name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Inventory group the play targets
    pub hosts: String,

    /// Play-level variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, Value>,

    /// Tasks in execution order
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

/// A task entry as written in the playbook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskDef {
    /// Task name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Condition gating the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Value>,

    /// Tasks grouped under this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Vec<TaskDef>>,

    /// Tasks run when the block fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescue: Option<Vec<TaskDef>>,

    /// Tasks run after the block regardless of outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always: Option<Vec<TaskDef>>,

    /// Remaining keys; a leaf task has exactly one, naming its module
    #[serde(flatten)]
    pub module: HashMap<String, Value>,
}

impl Play {
    /// Play variables as strings; non-scalar values are skipped
    pub fn string_vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .vars
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
            .collect();
        vars.sort();
        vars
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.hosts)
    }
}

impl TaskDef {
    pub fn is_block(&self) -> bool {
        self.block.is_some()
    }

    /// Name for reports: the task name, else the module name
    pub fn display_name(&self) -> String {
        match (&self.name, self.module.keys().next()) {
            (Some(name), _) => name.clone(),
            (None, Some(module)) => module.clone(),
            (None, None) if self.is_block() => "block".to_string(),
            (None, None) => "unnamed".to_string(),
        }
    }
}

/// Render a YAML scalar as a string
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
