//! Main CLI application

use crate::config::{parse_playbook_file, Host, Inventory, Play};
use crate::error::{AncibleError, ConfigError, Result};
use crate::runner::{
    ExecutionContext, Executor, ModuleRegistry, ModuleResult, Task, TaskGraph, Verbosity,
    VAR_CONNECTION, VAR_USER,
};
use crate::state::{StateStore, DEFAULT_STATE_DIR};
use crate::transport::DEFAULT_USER;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Inventory file used when `-i` is not given
pub const DEFAULT_INVENTORY: &str = "inventory.ini";

/// Connection type used when `-c` is not given
pub const DEFAULT_CONNECTION: &str = "local";

/// Settings for one playbook run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub playbook: PathBuf,
    pub inventory: PathBuf,
    pub verbosity: Verbosity,
    /// Number of `-v` flags
    pub verbose_level: u8,
    pub color: bool,
    pub connection: String,
    pub user: String,
    pub extra_vars: Vec<(String, String)>,
    pub state_dir: PathBuf,
}

impl Options {
    /// Options with defaults for everything but the playbook
    pub fn new(playbook: impl Into<PathBuf>) -> Self {
        Options {
            playbook: playbook.into(),
            inventory: PathBuf::from(DEFAULT_INVENTORY),
            verbosity: Verbosity::Normal,
            verbose_level: 0,
            color: false,
            connection: DEFAULT_CONNECTION.to_string(),
            user: DEFAULT_USER.to_string(),
            extra_vars: Vec::new(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }

    /// Build options from parsed arguments
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let playbook = matches
            .get_one::<PathBuf>("playbook")
            .cloned()
            .ok_or_else(|| ConfigError::Invalid("No playbook given".to_string()))?;

        let mut options = Options::new(playbook);
        options.verbose_level = matches.get_count("verbose");
        options.verbosity = get_verbosity(matches);
        options.color = matches.get_flag("color");

        if let Some(path) = matches.get_one::<PathBuf>("inventory") {
            options.inventory = path.clone();
        }
        if let Some(connection) = matches.get_one::<String>("connection") {
            options.connection = connection.clone();
        }
        if let Some(user) = matches.get_one::<String>("user") {
            options.user = user.clone();
        }
        if let Some(dir) = matches.get_one::<PathBuf>("state-dir") {
            options.state_dir = dir.clone();
        }
        if let Some(values) = matches.get_many::<String>("extra-vars") {
            for value in values {
                options.extra_vars.push(parse_extra_var(value)?);
            }
        }

        Ok(options)
    }
}

/// Per-status task counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub changed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Tasks that could not be executed at all
    pub errors: usize,
}

impl RunSummary {
    fn record(&mut self, result: &ModuleResult) {
        if result.skipped {
            self.skipped += 1;
        } else if result.failed {
            self.failed += 1;
        } else if result.changed {
            self.changed += 1;
        } else {
            self.ok += 1;
        }
    }

    /// Process exit status: 0 when nothing failed, 2 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 || self.errors > 0 {
            2
        } else {
            0
        }
    }
}

/// A play ready to run: its graph and resolved hosts
struct PreparedPlay<'p> {
    play: &'p Play,
    graph: TaskGraph,
    hosts: Vec<Host>,
}

/// CLI application
pub struct App {
    options: Options,
    registry: ModuleRegistry,
    state: StateStore,
}

impl App {
    /// Create an app with the built-in modules
    pub fn new(options: Options) -> Result<Self> {
        let registry = ModuleRegistry::with_builtins()?;
        Ok(Self::with_registry(options, registry))
    }

    /// Create an app with a caller-supplied module registry
    pub fn with_registry(options: Options, registry: ModuleRegistry) -> Self {
        let state = StateStore::new(options.state_dir.clone());
        App {
            options,
            registry,
            state,
        }
    }

    /// Load the playbook and inventory, then run every play
    ///
    /// Loader and configuration problems abort before any task runs. Task
    /// level errors are reported and the run moves on to the next task. A run
    /// record that cannot be written is logged and does not affect the run.
    pub fn run(&self) -> Result<RunSummary> {
        debug!(playbook = %self.options.playbook.display(), "Loading playbook");
        let plays = parse_playbook_file(&self.options.playbook)?;
        debug!(inventory = %self.options.inventory.display(), "Loading inventory");
        let inventory = Inventory::load(&self.options.inventory)?;

        let mut prepared = Vec::with_capacity(plays.len());
        for play in &plays {
            let graph = play.task_graph()?;
            let hosts = inventory.hosts(&play.hosts)?;
            for host in &hosts {
                self.host_context(play, host, &graph)?;
            }
            prepared.push(PreparedPlay { play, graph, hosts });
        }

        let executor = Executor::new(&self.registry);
        let mut summary = RunSummary::default();

        for PreparedPlay { play, graph, hosts } in &prepared {
            self.print_header("PLAY", play.display_name());
            for host in hosts {
                let mut ctx = self.host_context(play, host, graph)?;
                info!(host = %host.name, address = %host.address(), "Running tasks for host");
                for task in graph.root_tasks() {
                    if ctx.is_verbose() {
                        self.print_header("TASK", &task.name);
                    }
                    match executor.run_task(&mut ctx, task.id) {
                        Ok(result) => {
                            summary.record(&result);
                            self.report(host, task, &result);
                            if let Err(e) = self.state.save_result(&host.name, &task.name, &result) {
                                warn!(host = %host.name, task = %task.name, error = %e, "Failed to save run state");
                            }
                        }
                        Err(e) if e.is_task_local() => {
                            summary.errors += 1;
                            self.report_error(host, task, &e);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        debug!(?summary, "Run finished");
        Ok(summary)
    }

    /// Build a host's context with variables layered lowest to highest:
    /// context seeds, CLI defaults, inventory vars, play vars, extra vars
    fn host_context<'a>(
        &self,
        play: &Play,
        host: &'a Host,
        graph: &'a TaskGraph,
    ) -> Result<ExecutionContext<'a>> {
        let ctx = ExecutionContext::new(host, graph)
            .with_verbosity(self.options.verbosity)
            .with_vars([
                (VAR_USER, self.options.user.as_str()),
                (VAR_CONNECTION, self.options.connection.as_str()),
            ])
            .with_vars(&host.vars)
            .with_vars(play.string_vars())
            .with_vars(self.options.extra_vars.iter().cloned());

        ctx.connection().map_err(|_| {
            ConfigError::UnsupportedConnection(format!(
                "{} (host '{}')",
                ctx.get_var(VAR_CONNECTION).unwrap_or_default(),
                host.name
            ))
        })?;
        Ok(ctx)
    }

    fn print_header(&self, kind: &str, name: &str) {
        if self.options.verbosity == Verbosity::Quiet {
            return;
        }
        println!("\n{} [{}] {}", kind, name, "*".repeat(24));
    }

    fn report(&self, host: &Host, task: &Task, result: &ModuleResult) {
        let label = match result.status() {
            "skipped" => "[SKIPPED]".cyan(),
            "failed" => "[FAILED]".red().bold(),
            "changed" => "[CHANGED]".yellow(),
            _ => "[OK]".green(),
        };
        if self.options.verbosity == Verbosity::Quiet && !result.failed {
            return;
        }
        println!("{} {} | {}", label, host.name, task.name);

        if self.options.verbosity < Verbosity::Verbose {
            return;
        }
        if let Some(msg) = &result.msg {
            println!("  Message: {}", msg);
        }
        if let Some(command) = &result.command {
            if !command.stdout.is_empty() {
                println!("  Stdout: {}", command.stdout_lossy().trim_end());
            }
            if !command.stderr.is_empty() {
                println!("  Stderr: {}", command.stderr_lossy().trim_end());
            }
        }
    }

    fn report_error(&self, host: &Host, task: &Task, error: &AncibleError) {
        println!("{} {} | {}: {}", "[ERROR]".red().bold(), host.name, task.name, error);
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("ancible")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run an Ansible-style playbook against an INI inventory")
        .arg(
            Arg::new("playbook")
                .value_name("PLAYBOOK")
                .help("Playbook YAML file")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("inventory")
                .short('i')
                .long("inventory")
                .value_name("INVENTORY")
                .help("Inventory file")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_INVENTORY),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity (-v shows task output, -vv adds debug logs)")
                .action(ArgAction::Count)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only report failures and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .help("Enable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("connection")
                .short('c')
                .long("connection")
                .value_name("TYPE")
                .help("Default connection type")
                .value_parser(["local", "ssh"])
                .default_value(DEFAULT_CONNECTION),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .value_name("USER")
                .help("Default remote user")
                .default_value(DEFAULT_USER),
        )
        .arg(
            Arg::new("extra-vars")
                .short('e')
                .long("extra-vars")
                .value_name("KEY=VALUE")
                .help("Set a variable, overriding inventory and play vars")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("state-dir")
                .long("state-dir")
                .value_name("DIR")
                .help("Directory for per-host run state")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_STATE_DIR),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_count("verbose") > 0 {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Split a `KEY=VALUE` extra variable
fn parse_extra_var(value: &str) -> Result<(String, String)> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err(ConfigError::Invalid(format!(
            "Extra variable '{}' must be KEY=VALUE",
            value
        ))
        .into()),
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides the level
fn init_logging(options: &Options) {
    let level = match (options.verbosity, options.verbose_level) {
        (Verbosity::Quiet, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A subscriber may already be installed when running embedded
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(options.color),
        )
        .with(filter)
        .try_init();
}

/// Run the CLI application with arguments from the environment
pub fn run() -> Result<RunSummary> {
    run_from(std::env::args_os())
}

/// Run the CLI application with provided arguments
pub fn run_from<I, T>(args: I) -> Result<RunSummary>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().get_matches_from(args);
    let options = Options::from_matches(&matches)?;

    colored::control::set_override(options.color);
    init_logging(&options);

    App::new(options)?.run()
}
