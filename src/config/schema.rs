//! Playbook validation
//!
//! This module checks playbook definitions before they are lowered into a
//! task graph.

use crate::config::types::{Play, TaskDef};
use crate::error::{ConfigError, ConfigResult};

/// Validate every play in a playbook
pub fn validate_playbook(plays: &[Play]) -> ConfigResult<()> {
    if plays.is_empty() {
        return Err(ConfigError::Invalid("Playbook contains no plays".to_string()));
    }
    for play in plays {
        validate_play(play)?;
    }
    Ok(())
}

/// Validate a single play
pub fn validate_play(play: &Play) -> ConfigResult<()> {
    if play.hosts.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Play '{}' does not name any hosts",
            play.display_name()
        )));
    }
    if play.tasks.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Play '{}' has no tasks",
            play.display_name()
        )));
    }
    for task in &play.tasks {
        validate_task(task)?;
    }
    Ok(())
}

/// Validate a task entry and everything nested in it
pub fn validate_task(task: &TaskDef) -> ConfigResult<()> {
    let name = task.display_name();

    if let Some(when) = &task.when {
        if crate::config::scalar_to_string(when).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Task '{}' has a non-scalar 'when' condition",
                name
            )));
        }
    }

    if task.is_block() {
        if !task.module.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Block '{}' cannot also name a module ({})",
                name,
                module_list(task)
            )));
        }
        let sections = [&task.block, &task.rescue, &task.always];
        for section in sections.into_iter().flatten() {
            for child in section {
                validate_task(child)?;
            }
        }
        return Ok(());
    }

    if task.rescue.is_some() || task.always.is_some() {
        return Err(ConfigError::Invalid(format!(
            "Task '{}' has rescue or always without a block",
            name
        )));
    }

    match task.module.len() {
        0 => Err(ConfigError::MissingModule(name)),
        1 => Ok(()),
        _ => Err(ConfigError::MultipleModules {
            task: name,
            modules: module_list(task),
        }),
    }
}

fn module_list(task: &TaskDef) -> String {
    let mut keys: Vec<&str> = task.module.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys.join(", ")
}
