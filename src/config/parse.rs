//! Playbook file parsing and lowering

use crate::config::schema::validate_playbook;
use crate::config::types::{scalar_to_string, Play, TaskDef};
use crate::error::{AncibleError, ConfigError, Result};
use crate::runner::{TaskGraph, TaskGraphBuilder, TaskId};
use serde_yaml::Value;
use std::fs;
use std::path::Path;

/// Parse and validate a playbook file
pub fn parse_playbook_file(path: &Path) -> Result<Vec<Play>> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }
    let contents = fs::read_to_string(path)?;
    parse_playbook(&contents)
}

/// Parse and validate a playbook from a string
pub fn parse_playbook(yaml: &str) -> Result<Vec<Play>> {
    let plays: Vec<Play> = serde_yaml::from_str(yaml)?;
    validate_playbook(&plays)?;
    Ok(plays)
}

impl Play {
    /// Lower this play's tasks into an executable task graph
    pub fn task_graph(&self) -> Result<TaskGraph> {
        build_task_graph(&self.tasks)
    }
}

/// Lower task definitions into a task graph, one root per entry
pub fn build_task_graph(tasks: &[TaskDef]) -> Result<TaskGraph> {
    let mut builder = TaskGraph::builder();
    for def in tasks {
        let id = lower_task(&mut builder, def)?;
        builder.root(id)?;
    }
    Ok(builder.build())
}

fn lower_task(builder: &mut TaskGraphBuilder, def: &TaskDef) -> Result<TaskId> {
    let name = def.display_name();

    let id = match &def.block {
        Some(block) => {
            let children = lower_all(builder, block)?;
            let id = builder.block(name.clone(), children)?;
            if let Some(rescue) = &def.rescue {
                let children = lower_all(builder, rescue)?;
                builder.rescue(id, children)?;
            }
            if let Some(always) = &def.always {
                let children = lower_all(builder, always)?;
                builder.always(id, children)?;
            }
            id
        }
        None => {
            let (module, value) = def
                .module
                .iter()
                .next()
                .ok_or_else(|| ConfigError::MissingModule(name.clone()))?;
            let args = module_args(&name, value)?;
            builder.normal(name.clone(), module.clone(), args)
        }
    };

    if let Some(when) = &def.when {
        let expression = scalar_to_string(when).ok_or_else(|| {
            ConfigError::Invalid(format!("Task '{}' has a non-scalar 'when' condition", name))
        })?;
        builder.when(id, expression)?;
    }

    Ok(id)
}

fn lower_all(builder: &mut TaskGraphBuilder, defs: &[TaskDef]) -> Result<Vec<TaskId>> {
    defs.iter().map(|def| lower_task(builder, def)).collect()
}

/// Turn a module value into its argument text
///
/// Scalars are used as-is; a mapping must carry the command line under `cmd`.
fn module_args(task: &str, value: &Value) -> std::result::Result<String, AncibleError> {
    if let Some(args) = scalar_to_string(value) {
        return Ok(args.trim().to_string());
    }
    if let Value::Mapping(map) = value {
        if let Some(cmd) = map.get("cmd").and_then(scalar_to_string) {
            return Ok(cmd.trim().to_string());
        }
    }
    Err(ConfigError::UnsupportedArgs {
        task: task.to_string(),
        detail: "expected a string or a mapping with 'cmd'".to_string(),
    }
    .into())
}
