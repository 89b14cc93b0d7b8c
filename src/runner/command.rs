//! Built-in `command` module
//!
//! Runs its argument text verbatim as a shell command line on the target
//! host.

use crate::runner::{ExecutionContext, Module, ModuleResult};
use crate::transport::run_command;
use tracing::{debug, warn};

/// The `command` module
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandModule;

impl Module for CommandModule {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, args: &str) -> ModuleResult {
        if args.is_empty() {
            return ModuleResult::failed("No command specified");
        }

        let output = match run_command(ctx, args) {
            Ok(output) => output,
            Err(e) => {
                warn!(host = %ctx.host().name, error = %e, "Failed to execute command");
                return ModuleResult::failed("Failed to execute command");
            }
        };

        debug!(exit_code = output.exit_code, "Command finished");

        if output.success() {
            ModuleResult::changed("Command executed successfully").with_command(output)
        } else {
            let msg = format!("Command failed with exit code {}", output.exit_code);
            ModuleResult::failed(msg).with_command(output)
        }
    }
}
