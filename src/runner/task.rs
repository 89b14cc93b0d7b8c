//! Task graph types
//!
//! A playbook's tasks live in a flat arena and refer to each other by
//! [`TaskId`]. Blocks carry direct references to their rescue and always
//! sections, so the engine never has to scan siblings to find them.

use crate::error::{GraphError, GraphResult};
use std::fmt;

/// Index of a task inside its [`TaskGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a task does when it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Dispatches `args` to the named module
    Normal { module: String, args: String },

    /// Runs `children` fail-fast, with optional recovery sections
    Block {
        children: Vec<TaskId>,
        rescue: Option<TaskId>,
        always: Option<TaskId>,
    },

    /// Runs only when its block failed
    Rescue { children: Vec<TaskId> },

    /// Runs after its block regardless of outcome
    Always { children: Vec<TaskId> },
}

impl TaskKind {
    /// Short label used in logs and error messages
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Normal { .. } => "normal",
            TaskKind::Block { .. } => "block",
            TaskKind::Rescue { .. } => "rescue",
            TaskKind::Always { .. } => "always",
        }
    }

    /// Ordered children (empty for normal tasks)
    pub fn children(&self) -> &[TaskId] {
        match self {
            TaskKind::Normal { .. } => &[],
            TaskKind::Block { children, .. }
            | TaskKind::Rescue { children }
            | TaskKind::Always { children } => children,
        }
    }
}

/// A single task in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub when: Option<String>,
    pub parent: Option<TaskId>,
    pub kind: TaskKind,
}

impl Task {
    /// Module name, for normal tasks
    pub fn module(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Normal { module, .. } => Some(module),
            _ => None,
        }
    }

    /// Module argument text, for normal tasks
    pub fn args(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Normal { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Rescue and always sections are only reachable through their block
    pub fn is_handler(&self) -> bool {
        matches!(self.kind, TaskKind::Rescue { .. } | TaskKind::Always { .. })
    }
}

/// Read-only forest of tasks for one playbook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    roots: Vec<TaskId>,
}

impl TaskGraph {
    /// Start building a graph
    pub fn builder() -> TaskGraphBuilder {
        TaskGraphBuilder::default()
    }

    /// Look up a task by id
    pub fn get(&self, id: TaskId) -> GraphResult<&Task> {
        self.tasks.get(id.0).ok_or(GraphError::InvalidTask(id))
    }

    /// Top-level entries in execution order
    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    /// Iterate over the top-level tasks in execution order
    pub fn root_tasks(&self) -> impl Iterator<Item = &Task> {
        self.roots.iter().map(move |id| &self.tasks[id.0])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Incremental constructor for [`TaskGraph`]
///
/// Children are created before the task that owns them, so a finished graph
/// cannot contain cycles.
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    tasks: Vec<Task>,
    roots: Vec<TaskId>,
}

impl TaskGraphBuilder {
    /// Add a normal task that dispatches `args` to `module`
    pub fn normal(
        &mut self,
        name: impl Into<String>,
        module: impl Into<String>,
        args: impl Into<String>,
    ) -> TaskId {
        self.push(
            name.into(),
            TaskKind::Normal {
                module: module.into(),
                args: args.into(),
            },
        )
    }

    /// Add a block owning `children`
    pub fn block(&mut self, name: impl Into<String>, children: Vec<TaskId>) -> GraphResult<TaskId> {
        let id = self.next_id();
        self.adopt(id, &children)?;
        Ok(self.push(
            name.into(),
            TaskKind::Block {
                children,
                rescue: None,
                always: None,
            },
        ))
    }

    /// Attach a rescue section to `block`
    pub fn rescue(&mut self, block: TaskId, children: Vec<TaskId>) -> GraphResult<TaskId> {
        self.attach(block, "rescue", children)
    }

    /// Attach an always section to `block`
    pub fn always(&mut self, block: TaskId, children: Vec<TaskId>) -> GraphResult<TaskId> {
        self.attach(block, "always", children)
    }

    /// Gate a task on a `when` expression
    pub fn when(&mut self, id: TaskId, expression: impl Into<String>) -> GraphResult<()> {
        let task = self
            .tasks
            .get_mut(id.0)
            .ok_or(GraphError::InvalidTask(id))?;
        task.when = Some(expression.into());
        Ok(())
    }

    /// Append a top-level entry
    pub fn root(&mut self, id: TaskId) -> GraphResult<()> {
        let task = self.tasks.get(id.0).ok_or(GraphError::InvalidTask(id))?;
        if task.is_handler() {
            return Err(GraphError::HandlerEntryPoint {
                id,
                kind: task.kind.label(),
            });
        }
        if task.parent.is_some() || self.roots.contains(&id) {
            return Err(GraphError::NestedRoot(id));
        }
        self.roots.push(id);
        Ok(())
    }

    /// Finish the graph
    pub fn build(self) -> TaskGraph {
        TaskGraph {
            tasks: self.tasks,
            roots: self.roots,
        }
    }

    fn next_id(&self) -> TaskId {
        TaskId(self.tasks.len())
    }

    fn push(&mut self, name: String, kind: TaskKind) -> TaskId {
        let id = self.next_id();
        self.tasks.push(Task {
            id,
            name,
            when: None,
            parent: None,
            kind,
        });
        id
    }

    fn adopt(&mut self, parent: TaskId, children: &[TaskId]) -> GraphResult<()> {
        // Validate everything before mutating so a failed call leaves no trace.
        for (i, child) in children.iter().enumerate() {
            let task = self
                .tasks
                .get(child.0)
                .ok_or(GraphError::InvalidTask(*child))?;
            if task.parent.is_some() || self.roots.contains(child) || children[..i].contains(child)
            {
                return Err(GraphError::AlreadyParented(*child));
            }
        }
        for child in children {
            self.tasks[child.0].parent = Some(parent);
        }
        Ok(())
    }

    fn attach(
        &mut self,
        block: TaskId,
        kind: &'static str,
        children: Vec<TaskId>,
    ) -> GraphResult<TaskId> {
        match self.tasks.get(block.0).map(|t| &t.kind) {
            None => return Err(GraphError::InvalidTask(block)),
            Some(TaskKind::Block { rescue, always, .. }) => {
                let taken = if kind == "rescue" { rescue } else { always };
                if taken.is_some() {
                    return Err(GraphError::DuplicateHandler { block, kind });
                }
            }
            Some(_) => return Err(GraphError::HandlerOnNonBlock(block)),
        }

        let id = self.next_id();
        self.adopt(id, &children)?;
        let section = if kind == "rescue" {
            TaskKind::Rescue { children }
        } else {
            TaskKind::Always { children }
        };
        let block_name = self.tasks[block.0].name.clone();
        let id = self.push(format!("{} ({})", block_name, kind), section);
        self.tasks[id.0].parent = Some(block);

        if let TaskKind::Block { rescue, always, .. } = &mut self.tasks[block.0].kind {
            if kind == "rescue" {
                *rescue = Some(id);
            } else {
                *always = Some(id);
            }
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_block_with_handlers() {
        let mut b = TaskGraph::builder();
        let first = b.normal("first", "command", "true");
        let block = b.block("group", vec![first]).unwrap();
        let fix = b.normal("fix", "command", "echo fix");
        let rescue = b.rescue(block, vec![fix]).unwrap();
        let always = b.always(block, vec![]).unwrap();
        b.root(block).unwrap();
        let graph = b.build();

        assert_eq!(graph.roots(), &[block]);
        assert_eq!(graph.get(first).unwrap().parent, Some(block));
        assert_eq!(graph.get(rescue).unwrap().parent, Some(block));
        assert_eq!(graph.get(fix).unwrap().parent, Some(rescue));
        match &graph.get(block).unwrap().kind {
            TaskKind::Block {
                children,
                rescue: r,
                always: a,
            } => {
                assert_eq!(children, &vec![first]);
                assert_eq!(*r, Some(rescue));
                assert_eq!(*a, Some(always));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_second_rescue_rejected() {
        let mut b = TaskGraph::builder();
        let block = b.block("group", vec![]).unwrap();
        b.rescue(block, vec![]).unwrap();
        assert_eq!(
            b.rescue(block, vec![]),
            Err(GraphError::DuplicateHandler {
                block,
                kind: "rescue"
            })
        );
    }

    #[test]
    fn test_rescue_on_normal_task_rejected() {
        let mut b = TaskGraph::builder();
        let task = b.normal("t", "command", "true");
        assert_eq!(b.rescue(task, vec![]), Err(GraphError::HandlerOnNonBlock(task)));
    }

    #[test]
    fn test_child_cannot_have_two_parents() {
        let mut b = TaskGraph::builder();
        let shared = b.normal("shared", "command", "true");
        b.block("one", vec![shared]).unwrap();
        assert_eq!(
            b.block("two", vec![shared]),
            Err(GraphError::AlreadyParented(shared))
        );
    }

    #[test]
    fn test_handler_cannot_be_root() {
        let mut b = TaskGraph::builder();
        let block = b.block("group", vec![]).unwrap();
        let always = b.always(block, vec![]).unwrap();
        assert!(matches!(
            b.root(always),
            Err(GraphError::HandlerEntryPoint { kind: "always", .. })
        ));
    }

    #[test]
    fn test_nested_task_cannot_be_root() {
        let mut b = TaskGraph::builder();
        let child = b.normal("child", "command", "true");
        b.block("group", vec![child]).unwrap();
        assert_eq!(b.root(child), Err(GraphError::NestedRoot(child)));
    }

    #[test]
    fn test_invalid_lookup() {
        let graph = TaskGraph::builder().build();
        assert_eq!(graph.get(TaskId(3)), Err(GraphError::InvalidTask(TaskId(3))));
        assert!(graph.is_empty());
    }
}
