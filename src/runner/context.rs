//! Execution context for task running
//!
//! One context exists per target host. It owns that host's variables and
//! borrows the host identity and the task graph being executed.

use crate::config::Host;
use crate::error::TransportResult;
use crate::runner::TaskGraph;
use crate::transport::Connection;
use std::collections::HashMap;

/// Variable naming the address commands are sent to
pub const VAR_HOST: &str = "ansible_host";

/// Variable naming the remote login user
pub const VAR_USER: &str = "ansible_user";

/// Variable selecting the transport (`local` or `ssh`)
pub const VAR_CONNECTION: &str = "ansible_connection";

/// Per-host execution state
pub struct ExecutionContext<'a> {
    /// Target host, owned by the inventory
    host: &'a Host,

    /// Task graph being executed, owned by the playbook
    graph: &'a TaskGraph,

    /// Host variables (last write wins)
    vars: HashMap<String, String>,

    /// Verbosity level
    pub verbosity: Verbosity,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Normal = 1,
    Verbose = 2,
}

impl<'a> ExecutionContext<'a> {
    /// Create a context for `host`, seeded with its address and the default
    /// `ssh` connection
    pub fn new(host: &'a Host, graph: &'a TaskGraph) -> Self {
        let mut vars = HashMap::new();
        vars.insert(VAR_HOST.to_string(), host.address().to_string());
        vars.insert(VAR_CONNECTION.to_string(), "ssh".to_string());

        ExecutionContext {
            host,
            graph,
            vars,
            verbosity: Verbosity::Normal,
        }
    }

    /// Merge variables, overwriting existing keys
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set_var(key, value);
        }
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set a single variable
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Get a variable value
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Remove a variable, returning its previous value
    pub fn unset_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// All variables, in no particular order
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn host(&self) -> &'a Host {
        self.host
    }

    pub fn graph(&self) -> &'a TaskGraph {
        self.graph
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }

    /// Transport selected by `ansible_connection` (unset means `ssh`)
    pub fn connection(&self) -> TransportResult<Connection> {
        Connection::parse(self.get_var(VAR_CONNECTION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    fn graph() -> TaskGraph {
        TaskGraph::builder().build()
    }

    #[test]
    fn test_context_new_seeds_host_and_connection() {
        let host = Host::new("web01").with_address("10.0.0.5");
        let graph = graph();
        let ctx = ExecutionContext::new(&host, &graph);

        assert_eq!(ctx.verbosity, Verbosity::Normal);
        assert_eq!(ctx.get_var(VAR_HOST), Some("10.0.0.5"));
        assert_eq!(ctx.get_var(VAR_CONNECTION), Some("ssh"));
        assert_eq!(ctx.host().name, "web01");
    }

    #[test]
    fn test_context_host_falls_back_to_name() {
        let host = Host::new("db01");
        let graph = graph();
        let ctx = ExecutionContext::new(&host, &graph);
        assert_eq!(ctx.get_var(VAR_HOST), Some("db01"));
    }

    #[test]
    fn test_set_var_last_write_wins() {
        let host = Host::new("h");
        let graph = graph();
        let mut ctx = ExecutionContext::new(&host, &graph);

        ctx.set_var("env", "dev");
        ctx.set_var("env", "prod");
        assert_eq!(ctx.get_var("env"), Some("prod"));
        assert_eq!(ctx.vars().filter(|(k, _)| *k == "env").count(), 1);
    }

    #[test]
    fn test_with_vars_and_unset() {
        let host = Host::new("h");
        let graph = graph();
        let mut ctx = ExecutionContext::new(&host, &graph).with_vars([("a", "1"), ("b", "2")]);

        assert_eq!(ctx.get_var("a"), Some("1"));
        assert_eq!(ctx.unset_var("a"), Some("1".to_string()));
        assert_eq!(ctx.get_var("a"), None);
    }

    #[test]
    fn test_connection_selection() {
        let host = Host::new("h");
        let graph = graph();
        let mut ctx = ExecutionContext::new(&host, &graph);

        assert_eq!(ctx.connection().unwrap(), Connection::Ssh);

        ctx.set_var(VAR_CONNECTION, "local");
        assert_eq!(ctx.connection().unwrap(), Connection::Local);

        ctx.unset_var(VAR_CONNECTION);
        assert_eq!(ctx.connection().unwrap(), Connection::Ssh);

        ctx.set_var(VAR_CONNECTION, "winrm");
        assert!(matches!(
            ctx.connection(),
            Err(TransportError::UnsupportedConnection(v)) if v == "winrm"
        ));
    }

    #[test]
    fn test_verbosity_levels() {
        assert!(Verbosity::Verbose > Verbosity::Normal);
        assert!(Verbosity::Normal > Verbosity::Quiet);

        let host = Host::new("h");
        let graph = graph();
        let ctx = ExecutionContext::new(&host, &graph).with_verbosity(Verbosity::Verbose);
        assert!(ctx.is_verbose());
    }
}
