//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, logging setup and the
//! play/host/task loop that drives a playbook run.

pub mod app;

// Re-export main types
pub use app::*;
