//! Task execution engine
//!
//! This module handles the execution of tasks, including conditional
//! gating, module dispatch and block/rescue/always handling.

pub mod command;
pub mod context;
pub mod executor;
pub mod module;
pub mod task;
pub mod when;

// Re-export main types
pub use command::*;
pub use context::*;
pub use executor::*;
pub use module::*;
pub use task::*;
pub use when::*;
