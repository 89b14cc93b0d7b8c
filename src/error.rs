//! Error types for Ancible

use crate::runner::TaskId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Ancible operations
pub type Result<T> = std::result::Result<T, AncibleError>;

/// Main error type for Ancible
#[derive(Error, Debug)]
pub enum AncibleError {
    /// Playbook, inventory and connection configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid task references and misuse of the task graph
    #[error("Task graph error: {0}")]
    Graph(#[from] GraphError),

    /// Malformed `when` expressions
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Module registration and lookup errors
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Process spawning and connection selection errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Host names that do not map to a single directory under the state root
    #[error("Host name '{0}' cannot be used as a state directory")]
    StatePath(String),
}

/// Playbook and inventory loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Task '{0}' does not name a module")]
    MissingModule(String),

    #[error("Task '{task}' names more than one module: {modules}")]
    MultipleModules { task: String, modules: String },

    #[error("Task '{task}' has arguments that cannot be used as a command line: {detail}")]
    UnsupportedArgs { task: String, detail: String },

    #[error("No hosts found for group '{0}'")]
    HostGroupNotFound(String),

    #[error("Inventory line {line}: {message}")]
    Inventory { line: usize, message: String },

    #[error("Unsupported connection type: {0}")]
    UnsupportedConnection(String),
}

/// Task graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Invalid task index {0}")]
    InvalidTask(TaskId),

    #[error("Task {0} is not a block")]
    NotABlock(TaskId),

    #[error("{kind} task {id} cannot be executed directly")]
    HandlerEntryPoint { id: TaskId, kind: &'static str },

    #[error("Task {0} already belongs to another parent")]
    AlreadyParented(TaskId),

    #[error("Block {block} already has a {kind} section")]
    DuplicateHandler { block: TaskId, kind: &'static str },

    #[error("Rescue and always sections can only be attached to a block, not task {0}")]
    HandlerOnNonBlock(TaskId),

    #[error("Task {0} has a parent and cannot be a top-level entry")]
    NestedRoot(TaskId),
}

/// Condition evaluation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("Cannot evaluate condition: {0}")]
    Malformed(String),

    #[error("Operands of '{operator}' must be integers in condition: {expression}")]
    NonNumericOperand {
        expression: String,
        operator: &'static str,
    },
}

/// Module registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module '{0}' not found")]
    NotFound(String),

    #[error("Module '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("Module registry is full (max {0} modules)")]
    RegistryFull(usize),
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn shell: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to collect command output: {0}")]
    Wait(#[source] io::Error),

    #[error("Unsupported connection type: {0}")]
    UnsupportedConnection(String),

    #[error("Refusing ssh target '{0}'")]
    InvalidTarget(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for task graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Specialized result type for condition evaluation
pub type ConditionResult<T> = std::result::Result<T, ConditionError>;

/// Specialized result type for module registry operations
pub type RegistryResult<T> = std::result::Result<T, ModuleError>;

/// Specialized result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

impl AncibleError {
    /// Whether this error aborts only the task it was raised for
    ///
    /// These are fatal to a single task invocation only; the caller may move
    /// on to the next top-level task.
    pub fn is_task_local(&self) -> bool {
        matches!(
            self,
            AncibleError::Graph(_) | AncibleError::Condition(_) | AncibleError::Module(_)
        )
    }
}
