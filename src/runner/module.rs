//! Module registry and dispatch
//!
//! Modules are named units of work invoked with a context and an argument
//! string. The registry is filled once before any host runs and is only read
//! afterwards, so one registry can be shared by every host.

use crate::error::{ModuleError, RegistryResult};
use crate::runner::{CommandModule, ExecutionContext};
use crate::transport::CommandResult;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Maximum number of modules a registry accepts
pub const MAX_MODULES: usize = 32;

/// Outcome of one task invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub failed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandResult>,
}

impl ModuleResult {
    /// Successful run that modified the host
    pub fn changed(msg: impl Into<String>) -> Self {
        ModuleResult {
            changed: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    /// Successful run that left the host untouched
    pub fn ok(msg: impl Into<String>) -> Self {
        ModuleResult {
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    /// Failed run
    pub fn failed(msg: impl Into<String>) -> Self {
        ModuleResult {
            failed: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    /// Task not run because its condition was false
    pub fn skipped(msg: impl Into<String>) -> Self {
        ModuleResult {
            skipped: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    /// Attach the command output that produced this result
    pub fn with_command(mut self, command: CommandResult) -> Self {
        self.command = Some(command);
        self
    }

    /// Status word used in reports
    pub fn status(&self) -> &'static str {
        if self.skipped {
            "skipped"
        } else if self.failed {
            "failed"
        } else if self.changed {
            "changed"
        } else {
            "ok"
        }
    }
}

/// A pluggable unit of execution logic
///
/// Implementations report their own failures through
/// [`ModuleResult::failed`]; they never return an error.
pub trait Module: Send + Sync {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, args: &str) -> ModuleResult;
}

impl<F> Module for F
where
    F: Fn(&mut ExecutionContext<'_>, &str) -> ModuleResult + Send + Sync,
{
    fn execute(&self, ctx: &mut ExecutionContext<'_>, args: &str) -> ModuleResult {
        self(ctx, args)
    }
}

/// Name-keyed table of modules
pub struct ModuleRegistry {
    modules: HashMap<String, Box<dyn Module>>,
    capacity: usize,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_capacity(MAX_MODULES)
    }

    /// Create an empty registry that accepts at most `capacity` modules
    pub fn with_capacity(capacity: usize) -> Self {
        ModuleRegistry {
            modules: HashMap::new(),
            capacity,
        }
    }

    /// Create a registry holding the built-in modules
    pub fn with_builtins() -> RegistryResult<Self> {
        let mut registry = Self::new();
        registry.register("command", CommandModule)?;
        Ok(registry)
    }

    /// Register `module` under `name`
    pub fn register(&mut self, name: impl Into<String>, module: impl Module + 'static) -> RegistryResult<()> {
        let name = name.into();
        if self.modules.contains_key(&name) {
            return Err(ModuleError::AlreadyRegistered(name));
        }
        if self.modules.len() >= self.capacity {
            return Err(ModuleError::RegistryFull(self.capacity));
        }
        debug!(module = %name, "Registered module");
        self.modules.insert(name, Box::new(module));
        Ok(())
    }

    /// Look up `name` and run it with `args`
    pub fn dispatch(
        &self,
        name: &str,
        ctx: &mut ExecutionContext<'_>,
        args: &str,
    ) -> RegistryResult<ModuleResult> {
        let module = self
            .modules
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        debug!(module = %name, "Dispatching module");
        Ok(module.execute(ctx, args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .field("capacity", &self.capacity)
            .finish()
    }
}
