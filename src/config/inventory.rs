//! INI inventory parsing
//!
//! ```ini
//! # ungrouped hosts belong to `all` only
//! bastion ansible_host=203.0.113.7
//!
//! [web]
//! web01 ansible_host=10.0.0.5 ansible_user=deploy
//! web02
//!
//! [web:vars]
//! http_port=8080
//! ```

use crate::error::{ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Name of the implicit group holding every host
pub const ALL_GROUP: &str = "all";

static HOST_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("Invalid host variable regex")
});

/// A managed host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    /// Address to connect to, from `ansible_host=`
    pub address: Option<String>,
    pub vars: BTreeMap<String, String>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Host {
            name: name.into(),
            address: None,
            vars: BTreeMap::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// The connection address, falling back to the host name
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
struct Group {
    name: String,
    members: Vec<usize>,
    vars: BTreeMap<String, String>,
}

/// Parsed inventory: hosts in file order plus their groups
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    hosts: Vec<Host>,
    groups: Vec<Group>,
}

#[derive(Clone, Copy)]
enum Section {
    Ungrouped,
    Hosts(usize),
    Vars(usize),
}

impl Inventory {
    /// Load an inventory file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    /// Parse inventory text
    pub fn parse(contents: &str) -> ConfigResult<Self> {
        let mut inventory = Inventory::default();
        let mut section = Section::Ungrouped;

        for (index, raw) in contents.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let header = header.strip_suffix(']').ok_or_else(|| ConfigError::Inventory {
                    line: line_no,
                    message: format!("unterminated section header '{}'", line),
                })?;
                section = inventory.section(header.trim(), line_no)?;
                continue;
            }

            let tokens = shell_words::split(line).map_err(|e| ConfigError::Inventory {
                line: line_no,
                message: e.to_string(),
            })?;

            match section {
                Section::Vars(group) => {
                    for token in &tokens {
                        let (key, value) = parse_var(token, line_no)?;
                        inventory.groups[group].vars.insert(key, value);
                    }
                }
                Section::Hosts(group) => {
                    let host = inventory.add_host(&tokens, line_no)?;
                    let members = &mut inventory.groups[group].members;
                    if !members.contains(&host) {
                        members.push(host);
                    }
                }
                Section::Ungrouped => {
                    inventory.add_host(&tokens, line_no)?;
                }
            }
        }

        Ok(inventory)
    }

    fn section(&mut self, header: &str, line: usize) -> ConfigResult<Section> {
        let (name, suffix) = match header.split_once(':') {
            Some((name, suffix)) => (name.trim(), Some(suffix.trim())),
            None => (header, None),
        };
        if name.is_empty() {
            return Err(ConfigError::Inventory {
                line,
                message: "empty group name".to_string(),
            });
        }
        let group = self.group_index(name);
        match suffix {
            None => Ok(Section::Hosts(group)),
            Some("vars") => Ok(Section::Vars(group)),
            Some(other) => Err(ConfigError::Inventory {
                line,
                message: format!("unsupported section type '{}'", other),
            }),
        }
    }

    fn group_index(&mut self, name: &str) -> usize {
        if let Some(index) = self.groups.iter().position(|g| g.name == name) {
            return index;
        }
        self.groups.push(Group {
            name: name.to_string(),
            ..Group::default()
        });
        self.groups.len() - 1
    }

    /// Add or update a host from a tokenized line, returning its index
    fn add_host(&mut self, tokens: &[String], line: usize) -> ConfigResult<usize> {
        let (name, vars) = tokens.split_first().ok_or_else(|| ConfigError::Inventory {
            line,
            message: "missing host name".to_string(),
        })?;

        let index = match self.hosts.iter().position(|h| &h.name == name) {
            Some(index) => index,
            None => {
                self.hosts.push(Host::new(name.clone()));
                self.hosts.len() - 1
            }
        };

        for token in vars {
            let (key, value) = parse_var(token, line)?;
            let host = &mut self.hosts[index];
            if key == "ansible_host" {
                host.address = Some(value);
            } else {
                host.vars.insert(key, value);
            }
        }

        Ok(index)
    }

    /// All hosts in file order
    pub fn all_hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Group names in file order
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    /// Resolve a play's `hosts` pattern
    ///
    /// The pattern names a group, `all`, or a single host. Returned hosts
    /// carry their group variables underneath their own.
    pub fn hosts(&self, pattern: &str) -> ConfigResult<Vec<Host>> {
        let pattern = pattern.trim();
        let all_vars = self
            .groups
            .iter()
            .find(|g| g.name == ALL_GROUP)
            .map(|g| &g.vars);

        let (members, group_vars): (Vec<usize>, Option<&BTreeMap<String, String>>) =
            if pattern == ALL_GROUP {
                ((0..self.hosts.len()).collect(), None)
            } else if let Some(group) = self.groups.iter().find(|g| g.name == pattern) {
                (group.members.clone(), Some(&group.vars))
            } else if let Some(index) = self.hosts.iter().position(|h| h.name == pattern) {
                (vec![index], None)
            } else {
                return Err(ConfigError::HostGroupNotFound(pattern.to_string()));
            };

        let resolved = members
            .into_iter()
            .map(|index| {
                let host = &self.hosts[index];
                let mut vars = BTreeMap::new();
                for layer in [all_vars, group_vars].into_iter().flatten() {
                    vars.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                vars.extend(host.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
                Host {
                    name: host.name.clone(),
                    address: host.address.clone(),
                    vars,
                }
            })
            .collect();

        Ok(resolved)
    }
}

fn parse_var(token: &str, line: usize) -> ConfigResult<(String, String)> {
    let captures = HOST_VAR_REGEX
        .captures(token)
        .ok_or_else(|| ConfigError::Inventory {
            line,
            message: format!("expected key=value, found '{}'", token),
        })?;
    Ok((captures[1].to_string(), captures[2].to_string()))
}
