//! Main CLI application

use crate::config::{find_config_file, find_config_file_from, load_catalog, Catalog};
use crate::runner::{Engine, ExecutorKind, RunOverrides};
use anyhow::{Context as _, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Env var holding a tracing filter directive
pub const LOG_VAR: &str = "POET_LOG";

/// Global options that take a value
const VALUE_OPTIONS: &[&str] = &["-f", "--file", "-C", "--directory", "-e", "--executor"];

/// Command line split at the task name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Options for poet itself
    pub globals: Vec<String>,
    pub task: Option<String>,

    /// Everything after the task name, untouched
    pub task_args: Vec<String>,
}

/// Split arguments (program name excluded) at the first non-option token
///
/// Options before the task belong to poet; everything after it belongs to
/// the task, so task arguments may reuse poet's flag names.
pub fn split_invocation(args: &[String]) -> Invocation {
    let mut invocation = Invocation::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            invocation.globals.push(arg.clone());
            invocation.globals.extend(iter.next().cloned());
        } else if arg.starts_with('-') && arg != "-" {
            invocation.globals.push(arg.clone());
        } else {
            invocation.task = Some(arg.clone());
            invocation.task_args = iter.cloned().collect();
            break;
        }
    }
    invocation
}

/// Options for poet itself
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub file: Option<PathBuf>,
    pub directory: Option<PathBuf>,
    pub verbosity_delta: i8,
    pub dry_run: bool,
    pub executor: Option<ExecutorKind>,
    pub help: bool,
}

impl GlobalOptions {
    fn from_matches(matches: &ArgMatches) -> Self {
        let verbose = matches.get_count("verbose") as i8;
        let quiet = matches.get_count("quiet") as i8;
        GlobalOptions {
            file: matches.get_one::<String>("file").map(PathBuf::from),
            directory: matches.get_one::<String>("directory").map(PathBuf::from),
            verbosity_delta: verbose - quiet,
            dry_run: matches.get_flag("dry_run"),
            executor: matches
                .get_one::<String>("executor")
                .and_then(|name| ExecutorKind::from_name(name)),
            help: matches.get_flag("help"),
        }
    }

    /// Locate and load the task catalog
    pub fn load_catalog(&self) -> Result<Catalog> {
        let path = match (&self.file, &self.directory) {
            (Some(file), Some(dir)) => dir.join(file),
            (Some(file), None) => file.clone(),
            (None, Some(dir)) => find_config_file_from(dir.clone())?,
            (None, None) => find_config_file()?,
        };
        let catalog = load_catalog(&path)
            .with_context(|| format!("failed to load tasks from {}", path.display()))?;
        Ok(catalog)
    }
}

/// Build the clap command for poet's own options
pub fn build_command() -> Command {
    Command::new("poet")
        .version(clap::crate_version!())
        .about("A declarative task runner")
        .override_usage("poet [OPTIONS] [TASK] [TASK_ARGS]...")
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .help("Print help and the available tasks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to the poet.yml config file"),
        )
        .arg(
            Arg::new("directory")
                .short('C')
                .long("directory")
                .value_name("DIR")
                .help("Look for the config file starting from DIR"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase output (repeatable)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Decrease output (repeatable)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("dry_run")
                .short('d')
                .long("dry-run")
                .help("Print the task's actions without running them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("executor")
                .short('e')
                .long("executor")
                .value_name("TYPE")
                .value_parser(["simple", "virtualenv"])
                .help("Override the executor for this run"),
        )
}

/// Parse poet's own options
pub fn parse_globals(globals: &[String]) -> std::result::Result<GlobalOptions, clap::Error> {
    let matches = build_command().try_get_matches_from(std::iter::once("poet".to_string()).chain(globals.iter().cloned()))?;
    Ok(GlobalOptions::from_matches(&matches))
}

/// Diagnostic log level for a `-v`/`-q` count
fn log_level(verbosity_delta: i8) -> &'static str {
    match verbosity_delta {
        i8::MIN..=0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the tracing subscriber; `POET_LOG` overrides the level
fn init_logging(verbosity_delta: i8) {
    let filter = EnvFilter::try_from_env(LOG_VAR)
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbosity_delta)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Task listing shown under the help text
fn task_listing(catalog: &Catalog) -> String {
    let tasks: Vec<_> = catalog.visible().collect();
    if tasks.is_empty() {
        return "No tasks are configured".to_string();
    }
    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let mut out = format!("{}\n", "Configured tasks:".bold().underline());
    for task in tasks {
        let padding = " ".repeat(width - task.name.len());
        out.push_str(&format!(
            "  {}{}  {}\n",
            task.name.cyan(),
            padding,
            task.help().unwrap_or_default()
        ));
    }
    out
}

fn print_help(catalog: Option<&Catalog>) -> Result<()> {
    let mut command = build_command();
    if let Some(catalog) = catalog {
        command = command.after_help(task_listing(catalog));
    }
    command.print_help()?;
    println!();
    Ok(())
}

/// Run poet with the full process arguments, returning the exit code
pub fn run(argv: &[String]) -> Result<i32> {
    let invocation = split_invocation(argv.get(1..).unwrap_or_default());
    let options = match parse_globals(&invocation.globals) {
        Ok(options) => options,
        Err(e) => {
            let code = if e.use_stderr() { 2 } else { 0 };
            e.print()?;
            return Ok(code);
        }
    };
    init_logging(options.verbosity_delta);
    tracing::debug!(?invocation, "parsed command line");

    let task = match (&invocation.task, options.help) {
        (Some(task), false) => task,
        _ => {
            let catalog = options.load_catalog();
            print_help(catalog.as_ref().ok())?;
            return match catalog {
                Err(e) if !options.help => Err(e),
                _ => Ok(0),
            };
        }
    };

    let engine = Engine::new(options.load_catalog()?);
    let overrides = RunOverrides {
        dry_run: options.dry_run,
        executor: options.executor.clone(),
        verbosity_delta: options.verbosity_delta,
        cwd: None,
    };
    Ok(engine.run(task, &invocation.task_args, &overrides))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_invocation() {
        let invocation = split_invocation(&strings(&["-v", "-f", "x.yml", "greet", "--name", "nat", "-v"]));
        assert_eq!(invocation.globals, strings(&["-v", "-f", "x.yml"]));
        assert_eq!(invocation.task.as_deref(), Some("greet"));
        assert_eq!(invocation.task_args, strings(&["--name", "nat", "-v"]));
    }

    #[test]
    fn test_log_level_follows_verbosity() {
        assert_eq!(log_level(-1), "warn");
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        let vv = parse_globals(&strings(&["-vv"])).unwrap();
        assert_eq!(log_level(vv.verbosity_delta), "debug");
    }

    #[test]
    fn test_split_without_task() {
        let invocation = split_invocation(&strings(&["-q", "--dry-run"]));
        assert_eq!(invocation.task, None);
        assert!(invocation.task_args.is_empty());
    }

    #[test]
    fn test_parse_globals() {
        let options = parse_globals(&strings(&["-vv", "-q", "-d", "-e", "simple", "-C", "sub"])).unwrap();
        assert_eq!(options.verbosity_delta, 1);
        assert!(options.dry_run);
        assert_eq!(options.executor, Some(ExecutorKind::Simple));
        assert_eq!(options.directory, Some(PathBuf::from("sub")));
        assert!(!options.help);
    }

    #[test]
    fn test_parse_globals_rejects_unknown_executor() {
        assert!(parse_globals(&strings(&["-e", "poetry"])).is_err());
    }

    #[test]
    fn test_get_verbosity_normal() {
        let options = parse_globals(&[]).unwrap();
        assert_eq!(options.verbosity_delta, 0);
    }
}
