//! Playbook and inventory loading
//!
//! This module parses playbook YAML and INI inventories, validates them and
//! lowers playbook tasks into task graphs.

pub mod inventory;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use inventory::*;
pub use parse::*;
pub use schema::*;
pub use types::*;
