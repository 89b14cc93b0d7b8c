//! Remote execution through the `ssh` client
//!
//! A remote command is a local command: the command line is wrapped in a
//! non-interactive `ssh` invocation and handed to [`run_local`], so spawn
//! and capture behave exactly as they do for local execution.

use crate::error::{TransportError, TransportResult};
use crate::runner::{ExecutionContext, VAR_HOST, VAR_USER};
use crate::transport::{run_local, CommandResult};
use tracing::debug;

/// Login user when `ansible_user` is unset
pub const DEFAULT_USER: &str = "root";

/// Login user and address for the context's host
///
/// The address is `ansible_host`, else the host name; the user is
/// `ansible_user`, else [`DEFAULT_USER`].
pub fn ssh_target<'c>(ctx: &'c ExecutionContext<'_>) -> (&'c str, &'c str) {
    let user = ctx.get_var(VAR_USER).unwrap_or(DEFAULT_USER);
    let host = ctx.get_var(VAR_HOST).unwrap_or(ctx.host().name.as_str());
    (user, host)
}

/// Build the local command line that runs `command` on `user@host`
///
/// The target and the command are each quoted as a single shell word, and
/// a target that ssh could read as an option is refused.
pub fn ssh_command_line(user: &str, host: &str, command: &str) -> TransportResult<String> {
    if user.is_empty() || host.is_empty() || user.starts_with('-') || host.starts_with('-') {
        return Err(TransportError::InvalidTarget(format!("{}@{}", user, host)));
    }
    let target = format!("{}@{}", user, host);
    Ok(format!(
        "ssh -o BatchMode=yes -o StrictHostKeyChecking=no -- {} {}",
        shell_words::quote(&target),
        shell_words::quote(command)
    ))
}

/// Run `command` on the context's host over ssh
pub fn run_ssh(ctx: &ExecutionContext<'_>, command: &str) -> TransportResult<CommandResult> {
    let (user, host) = ssh_target(ctx);
    let line = ssh_command_line(user, host, command)?;

    debug!(host = %host, user = %user, "Executing remote command");
    run_local(&line)
}
