//! Execution context for task running
//!
//! The context tracks the state shared by every task in one run: the catalog,
//! script registry, working directory, verbosity, and the stack of tasks being
//! executed.

use crate::config::Catalog;
use crate::error::{ConfigError, ConfigResult};
use crate::runner::executor::ExecutorKind;
use crate::runner::task::TaskDefinition;
use crate::scripts::ScriptRegistry;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Absolute path of the project root
pub const ROOT_VAR: &str = "POET_ROOT";

/// Directory poet was invoked from
pub const CWD_VAR: &str = "POET_CWD";

/// Alias of [`CWD_VAR`]
pub const PWD_VAR: &str = "POET_PWD";

pub const VERBOSITY_VAR: &str = "POET_VERBOSITY";

/// Set in every child's environment; its presence marks a nested run
pub const ACTIVE_VAR: &str = "POET_ACTIVE";

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Verbosity {
    /// Map a signed level where 0 is normal
    pub fn from_level(level: i8) -> Self {
        match level {
            i8::MIN..=-2 => Verbosity::Silent,
            -1 => Verbosity::Quiet,
            0 => Verbosity::Normal,
            _ => Verbosity::Verbose,
        }
    }

    pub fn level(self) -> i8 {
        self as i8 - 2
    }
}

/// Execution context that tracks state during task execution
#[derive(Debug, Clone)]
pub struct RunContext {
    pub catalog: Arc<Catalog>,
    pub scripts: Arc<ScriptRegistry>,

    /// Directory tasks run in
    pub cwd: PathBuf,

    pub verbosity: Verbosity,

    /// Print actions without running them
    pub dry_run: bool,

    /// Executor forced from the command line
    pub executor_override: Option<ExecutorKind>,

    /// True when an enclosing poet run is active
    pub nested: bool,

    /// Stack of tasks being executed (for detecting recursion)
    pub task_stack: Vec<String>,

    /// Runtime whose blocking pool this invocation runs on
    pub runtime: Option<Handle>,
}

impl RunContext {
    pub fn new(catalog: Arc<Catalog>, scripts: Arc<ScriptRegistry>) -> Self {
        RunContext {
            cwd: catalog.root.clone(),
            verbosity: Verbosity::from_level(catalog.global.verbosity),
            catalog,
            scripts,
            dry_run: false,
            executor_override: None,
            nested: false,
            task_stack: Vec::new(),
            runtime: None,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = cwd;
        self
    }

    /// Context for running `task` one level deeper
    ///
    /// Fails when `task` is already being executed further up the stack.
    pub fn enter(&self, task: &TaskDefinition) -> ConfigResult<RunContext> {
        if self.is_task_in_stack(&task.name) {
            let mut cycle = self.task_stack.clone();
            cycle.push(task.name.clone());
            return Err(ConfigError::CyclicDependency(cycle.join(" -> ")));
        }

        let mut ctx = self.clone();
        ctx.task_stack.push(task.name.clone());
        if let Some(level) = task.options.verbosity {
            ctx.verbosity = Verbosity::from_level(level);
        }
        Ok(ctx)
    }

    pub fn is_task_in_stack(&self, task_name: &str) -> bool {
        self.task_stack.iter().any(|t| t == task_name)
    }

    pub fn current_task(&self) -> Option<&String> {
        self.task_stack.last()
    }

    /// Whether the current task was invoked directly
    pub fn is_top_level(&self) -> bool {
        self.task_stack.len() <= 1
    }

    /// The executor `task` should use
    pub fn executor_kind(&self, task: &TaskDefinition) -> ExecutorKind {
        self.executor_override
            .clone()
            .or_else(|| task.options.executor.clone())
            .unwrap_or_else(|| self.catalog.global.executor.clone())
    }

    /// Print the action a task is about to perform
    pub fn print_action(&self, action: &str) {
        if self.verbosity >= Verbosity::Normal {
            let arrow = if self.dry_run { "Poet <=" } else { "Poet =>" };
            eprintln!("{} {}", arrow.blue().bold(), action);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "Warning:".yellow().bold(), message);
        }
    }

    pub fn print_error(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
    }

    /// Print debug message (only in verbose mode)
    pub fn print_debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "Poet:".dimmed(), message);
        }
    }
}
