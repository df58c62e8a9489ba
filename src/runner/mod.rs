//! Task execution engine
//!
//! This module resolves task arguments and environments, runs prerequisites,
//! and dispatches each task kind to its runner.

pub mod args;
pub mod context;
pub mod engine;
pub mod executor;
pub mod graph;
pub mod output;
pub mod process;
pub mod runtime;
pub mod task;
pub mod tasks;

pub use args::{ArgType, ArgValue, ArgumentSpec, ResolvedArgs};
pub use context::{RunContext, Verbosity};
pub use engine::{Engine, RunOverrides};
pub use executor::ExecutorKind;
pub use output::{Outcome, OutputMode};
pub use task::{TaskDefinition, TaskKind, TaskType};
