//! Task execution engine
//!
//! Walks a host's task graph: evaluates `when` gates, dispatches normal tasks
//! to modules, and runs blocks with their rescue and always sections.
//!
//! Block results:
//!
//! - failures inside a rescue or always section are logged but do not change
//!   the block's result, and do not stop the rest of that section
//! - a block never reports `changed`, whatever its children did

use crate::error::{GraphError, Result};
use crate::runner::{evaluate_when, ExecutionContext, ModuleRegistry, ModuleResult, Task, TaskId, TaskKind};
use tracing::{debug, info, warn};

/// Message for tasks whose `when` evaluated to false
pub const SKIPPED_MSG: &str = "Skipped due to condition";

/// Runs tasks against one host at a time
///
/// The executor only borrows the registry, so any number of executors (for
/// example one per host) can share a single registry.
#[derive(Debug, Clone, Copy)]
pub struct Executor<'r> {
    registry: &'r ModuleRegistry,
}

impl<'r> Executor<'r> {
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        Executor { registry }
    }

    /// Run a normal task or a block
    ///
    /// Returns an error for invalid ids, for rescue/always sections (which are
    /// only reachable through their block), for malformed `when` expressions
    /// and for unknown modules.
    pub fn run_task(&self, ctx: &mut ExecutionContext<'_>, id: TaskId) -> Result<ModuleResult> {
        let task = ctx.graph().get(id)?;

        match &task.kind {
            TaskKind::Block { .. } => self.run_block(ctx, id),
            TaskKind::Rescue { .. } | TaskKind::Always { .. } => Err(GraphError::HandlerEntryPoint {
                id,
                kind: task.kind.label(),
            }
            .into()),
            TaskKind::Normal { module, args } => {
                if let Some(skipped) = self.check_when(ctx, task)? {
                    return Ok(skipped);
                }
                info!(task = %task.name, module = %module, "Running task");
                let result = self.registry.dispatch(module, ctx, args)?;
                debug!(task = %task.name, status = result.status(), "Task finished");
                Ok(result)
            }
        }
    }

    /// Run a block: children fail-fast, then rescue on failure, then always
    pub fn run_block(&self, ctx: &mut ExecutionContext<'_>, id: TaskId) -> Result<ModuleResult> {
        let block = ctx.graph().get(id)?;
        let (children, rescue, always) = match &block.kind {
            TaskKind::Block {
                children,
                rescue,
                always,
            } => (children, *rescue, *always),
            TaskKind::Rescue { .. } | TaskKind::Always { .. } => {
                return Err(GraphError::HandlerEntryPoint {
                    id,
                    kind: block.kind.label(),
                }
                .into())
            }
            TaskKind::Normal { .. } => return Err(GraphError::NotABlock(id).into()),
        };

        if let Some(skipped) = self.check_when(ctx, block)? {
            return Ok(skipped);
        }

        info!(block = %block.name, "Running block");

        let mut failed = false;
        for &child in children {
            if !self.run_child(ctx, child) {
                failed = true;
                break;
            }
        }

        if failed {
            if let Some(rescue) = rescue {
                info!(block = %block.name, "Executing rescue section");
                self.run_section(ctx, rescue)?;
                failed = false;
            }
        }

        if let Some(always) = always {
            info!(block = %block.name, "Executing always section");
            self.run_section(ctx, always)?;
        }

        Ok(if failed {
            ModuleResult::failed("Block execution failed")
        } else {
            ModuleResult::ok("Block executed successfully")
        })
    }

    /// Evaluate a task's `when`; `Some` carries the skip result
    fn check_when(&self, ctx: &ExecutionContext<'_>, task: &Task) -> Result<Option<ModuleResult>> {
        let Some(expression) = task.when.as_deref() else {
            return Ok(None);
        };
        if evaluate_when(ctx, expression)? {
            Ok(None)
        } else {
            debug!(task = %task.name, condition = %expression, "Skipping task due to condition");
            Ok(Some(ModuleResult::skipped(SKIPPED_MSG)))
        }
    }

    /// Run one child of a block or section; `true` means it succeeded
    fn run_child(&self, ctx: &mut ExecutionContext<'_>, id: TaskId) -> bool {
        match self.run_task(ctx, id) {
            Ok(result) => {
                self.log_child(ctx, id, &result);
                !result.failed
            }
            Err(e) => {
                warn!(task = %id, error = %e, "Task could not be executed");
                false
            }
        }
    }

    /// Run every child of a rescue or always section, ignoring failures
    fn run_section(&self, ctx: &mut ExecutionContext<'_>, id: TaskId) -> Result<()> {
        let section = ctx.graph().get(id)?;
        for &child in section.kind.children() {
            if !self.run_child(ctx, child) {
                warn!(section = %section.name, task = %child, "Task in section failed; continuing");
            }
        }
        Ok(())
    }

    fn log_child(&self, ctx: &ExecutionContext<'_>, id: TaskId, result: &ModuleResult) {
        if !ctx.is_verbose() {
            return;
        }
        let name = ctx.graph().get(id).map(|t| t.name.as_str()).unwrap_or("unnamed");
        if let Some(msg) = &result.msg {
            info!(task = %name, "Message: {}", msg);
        }
        if let Some(command) = &result.command {
            if !command.stdout.is_empty() {
                info!(task = %name, "Stdout: {}", command.stdout_lossy().trim_end());
            }
            if !command.stderr.is_empty() {
                info!(task = %name, "Stderr: {}", command.stderr_lossy().trim_end());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Host;
    use crate::error::{AncibleError, ConditionError, ModuleError};
    use crate::runner::{Module, TaskGraph};
    use std::sync::{Arc, Mutex};

    /// Records each invocation and fails when the argument is "fail"
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Module for Recorder {
        fn execute(&self, _ctx: &mut ExecutionContext<'_>, args: &str) -> ModuleResult {
            self.calls.lock().unwrap().push(args.to_string());
            if args == "fail" {
                ModuleResult::failed("boom")
            } else {
                ModuleResult::changed("done")
            }
        }
    }

    fn registry(recorder: &Recorder) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register("record", recorder.clone()).unwrap();
        registry
    }

    #[test]
    fn test_normal_task_dispatches() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let t = b.normal("t", "record", "hello");
        b.root(t).unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_task(&mut ctx, t).unwrap();
        assert!(result.changed);
        assert_eq!(recorder.calls(), vec!["hello"]);
    }

    #[test]
    fn test_false_condition_skips() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let t = b.normal("t", "record", "hello");
        b.when(t, "1 == 2").unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_task(&mut ctx, t).unwrap();
        assert!(result.skipped);
        assert!(!result.changed && !result.failed);
        assert_eq!(result.msg.as_deref(), Some(SKIPPED_MSG));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_malformed_condition_is_error() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let t = b.normal("t", "record", "hello");
        b.when(t, "what is this").unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let err = Executor::new(&registry).run_task(&mut ctx, t).unwrap_err();
        assert!(matches!(err, AncibleError::Condition(ConditionError::Malformed(_))));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_unknown_module() {
        let registry = ModuleRegistry::new();
        let mut b = TaskGraph::builder();
        let t = b.normal("t", "nope", "");
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let err = Executor::new(&registry).run_task(&mut ctx, t).unwrap_err();
        assert!(matches!(err, AncibleError::Module(ModuleError::NotFound(_))));
    }

    #[test]
    fn test_invalid_index() {
        let registry = ModuleRegistry::new();
        let graph = TaskGraph::default();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let err = Executor::new(&registry).run_task(&mut ctx, TaskId(9)).unwrap_err();
        assert!(matches!(err, AncibleError::Graph(GraphError::InvalidTask(TaskId(9)))));
    }

    #[test]
    fn test_sections_are_not_entry_points() {
        let registry = ModuleRegistry::new();
        let mut b = TaskGraph::builder();
        let block = b.block("b", vec![]).unwrap();
        let rescue = b.rescue(block, vec![]).unwrap();
        let always = b.always(block, vec![]).unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);
        let executor = Executor::new(&registry);

        for id in [rescue, always] {
            assert!(matches!(
                executor.run_task(&mut ctx, id),
                Err(AncibleError::Graph(GraphError::HandlerEntryPoint { .. }))
            ));
            assert!(matches!(
                executor.run_block(&mut ctx, id),
                Err(AncibleError::Graph(GraphError::HandlerEntryPoint { .. }))
            ));
        }
    }

    #[test]
    fn test_run_block_on_normal_task() {
        let registry = ModuleRegistry::new();
        let mut b = TaskGraph::builder();
        let t = b.normal("t", "record", "x");
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        assert!(matches!(
            Executor::new(&registry).run_block(&mut ctx, t),
            Err(AncibleError::Graph(GraphError::NotABlock(_)))
        ));
    }

    #[test]
    fn test_block_fail_fast_without_rescue() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let one = b.normal("one", "record", "one");
        let bad = b.normal("bad", "record", "fail");
        let never = b.normal("never", "record", "never");
        let block = b.block("b", vec![one, bad, never]).unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_block(&mut ctx, block).unwrap();
        assert!(result.failed);
        assert!(!result.changed);
        assert_eq!(result.msg.as_deref(), Some("Block execution failed"));
        assert_eq!(recorder.calls(), vec!["one", "fail"]);
    }

    #[test]
    fn test_block_rescued() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let bad = b.normal("bad", "record", "fail");
        let block = b.block("b", vec![bad]).unwrap();
        let fix = b.normal("fix", "record", "fix");
        b.rescue(block, vec![fix]).unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_task(&mut ctx, block).unwrap();
        assert!(!result.failed);
        assert!(!result.changed);
        assert_eq!(result.msg.as_deref(), Some("Block executed successfully"));
        assert_eq!(recorder.calls(), vec!["fail", "fix"]);
    }

    #[test]
    fn test_rescue_skipped_when_block_succeeds() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let good = b.normal("good", "record", "good");
        let block = b.block("b", vec![good]).unwrap();
        let fix = b.normal("fix", "record", "fix");
        b.rescue(block, vec![fix]).unwrap();
        let cleanup = b.normal("cleanup", "record", "cleanup");
        b.always(block, vec![cleanup]).unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_block(&mut ctx, block).unwrap();
        assert!(!result.failed);
        assert_eq!(recorder.calls(), vec!["good", "cleanup"]);
    }

    #[test]
    fn test_skipped_block_runs_nothing() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let good = b.normal("good", "record", "good");
        let block = b.block("b", vec![good]).unwrap();
        let cleanup = b.normal("cleanup", "record", "cleanup");
        b.always(block, vec![cleanup]).unwrap();
        b.when(block, "no").unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_block(&mut ctx, block).unwrap();
        assert!(result.skipped);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_child_condition_error_fails_block() {
        let recorder = Recorder::default();
        let registry = registry(&recorder);
        let mut b = TaskGraph::builder();
        let broken = b.normal("broken", "record", "broken");
        b.when(broken, "???").unwrap();
        let after = b.normal("after", "record", "after");
        let block = b.block("b", vec![broken, after]).unwrap();
        let graph = b.build();
        let host = Host::new("h");
        let mut ctx = ExecutionContext::new(&host, &graph);

        let result = Executor::new(&registry).run_block(&mut ctx, block).unwrap();
        assert!(result.failed);
        assert!(recorder.calls().is_empty());
    }
}
