//! Local command execution

use crate::error::{TransportError, TransportResult};
use crate::transport::CommandResult;
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Shell used to interpret command lines
const SHELL: &str = "/bin/sh";

/// Run `command` through `/bin/sh -c` and capture its output
///
/// Both pipes are drained to end-of-file before the exit status is
/// collected. Handles are owned by the `Child`, so they are closed on every
/// return path, including spawn failure.
pub fn run_local(command: &str) -> TransportResult<CommandResult> {
    debug!(command = %command, "Executing local command");

    let child = Command::new(SHELL)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(TransportError::Spawn)?;

    let output = child.wait_with_output().map_err(TransportError::Wait)?;

    // `code()` is None when the process was killed by a signal.
    let exit_code = output.status.code().unwrap_or(-1);

    trace!(
        exit_code,
        stdout_len = output.stdout.len(),
        stderr_len = output.stderr.len(),
        "Command completed"
    );

    Ok(CommandResult {
        exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let result = run_local("echo hi").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, b"hi\n");
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn test_exit_code() {
        let result = run_local("exit 3").unwrap();
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn test_streams_are_captured_separately() {
        let result = run_local("echo out; echo err >&2").unwrap();
        assert_eq!(result.stdout_lossy(), "out\n");
        assert_eq!(result.stderr_lossy(), "err\n");
    }

    #[test]
    fn test_large_output_is_not_truncated() {
        // Larger than a pipe buffer on both streams at once.
        let result = run_local("head -c 200000 /dev/zero; head -c 150000 /dev/zero >&2").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.len(), 200000);
        assert_eq!(result.stderr.len(), 150000);
    }

    #[test]
    fn test_killed_by_signal() {
        let result = run_local("kill -9 $$").unwrap();
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn test_command_not_found_is_a_normal_exit() {
        let result = run_local("definitely-not-a-command-ancible").unwrap();
        assert_eq!(result.exit_code, 127);
        assert!(!result.stderr.is_empty());
    }
}
