//! Common test utilities

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Inventory with a single local host
pub const LOCAL_INVENTORY: &str = "[local]\nlocalhost ansible_connection=local\n";

/// A temporary directory holding a playbook and an inventory
pub struct Workspace {
    pub dir: TempDir,
    pub playbook: PathBuf,
    pub inventory: PathBuf,
}

impl Workspace {
    pub fn new(playbook: &str, inventory: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let playbook_path = dir.path().join("site.yml");
        let inventory_path = dir.path().join("inventory.ini");
        fs::write(&playbook_path, playbook).unwrap();
        fs::write(&inventory_path, inventory).unwrap();
        Workspace {
            dir,
            playbook: playbook_path,
            inventory: inventory_path,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Path of a file inside the workspace, as a string for shell commands
    pub fn file(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    /// Parsed `last_run.json` for a host
    pub fn last_run(&self, host: &str) -> serde_json::Value {
        let path = self.state_dir().join(host).join("last_run.json");
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}
