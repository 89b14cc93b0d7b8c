use anyhow::Context;
use std::process;

fn main() -> anyhow::Result<()> {
    let summary = ancible::cli::run().context("ancible run failed")?;
    process::exit(summary.exit_code());
}
