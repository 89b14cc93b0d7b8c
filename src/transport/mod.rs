//! Command transport
//!
//! Runs a shell command line for a host, either as a local subprocess or
//! through the `ssh` client, and captures its output.

pub mod local;
pub mod ssh;

pub use local::run_local;
pub use ssh::{run_ssh, ssh_command_line, ssh_target, DEFAULT_USER};

use crate::error::{TransportError, TransportResult};
use crate::runner::ExecutionContext;
use serde::Serialize;
use std::fmt;

/// Output of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Exit status, or -1 if the process did not exit normally
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output decoded lossily as UTF-8
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded lossily as UTF-8
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// How commands reach the target host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Local,
    Ssh,
}

impl Connection {
    /// Parse an `ansible_connection` value; `None` selects `ssh`
    pub fn parse(value: Option<&str>) -> TransportResult<Self> {
        match value {
            None | Some("ssh") => Ok(Connection::Ssh),
            Some("local") => Ok(Connection::Local),
            Some(other) => Err(TransportError::UnsupportedConnection(other.to_string())),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Local => write!(f, "local"),
            Connection::Ssh => write!(f, "ssh"),
        }
    }
}

/// Run `command` on the context's host using its configured connection
pub fn run_command(ctx: &ExecutionContext<'_>, command: &str) -> TransportResult<CommandResult> {
    match ctx.connection()? {
        Connection::Local => run_local(command),
        Connection::Ssh => run_ssh(ctx, command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Host;
    use crate::runner::{TaskGraph, VAR_CONNECTION};

    #[test]
    fn test_parse_connection() {
        assert_eq!(Connection::parse(None).unwrap(), Connection::Ssh);
        assert_eq!(Connection::parse(Some("ssh")).unwrap(), Connection::Ssh);
        assert_eq!(Connection::parse(Some("local")).unwrap(), Connection::Local);
        assert!(Connection::parse(Some("docker")).is_err());
        assert!(Connection::parse(Some("LOCAL")).is_err());
    }

    #[test]
    fn test_run_command_local() {
        let host = Host::new("localhost");
        let graph = TaskGraph::default();
        let ctx = ExecutionContext::new(&host, &graph).with_vars([(VAR_CONNECTION, "local")]);

        let result = run_command(&ctx, "echo hi").unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout_lossy().contains("hi"));

        let result = run_command(&ctx, "exit 3").unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[test]
    fn test_run_command_rejects_unknown_connection() {
        let host = Host::new("localhost");
        let graph = TaskGraph::default();
        let ctx = ExecutionContext::new(&host, &graph).with_vars([(VAR_CONNECTION, "telnet")]);

        assert!(matches!(
            run_command(&ctx, "echo hi"),
            Err(TransportError::UnsupportedConnection(_))
        ));
    }
}
