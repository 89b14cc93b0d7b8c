//! Ancible - a sequential, Ansible-style playbook runner
//!
//! Ancible reads a YAML playbook and an INI inventory and runs each play's
//! tasks on its hosts, one host and one task at a time, either locally or
//! over the system `ssh` client.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use error::{AncibleError, Result};

/// Current version of Ancible
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
