//! CLI interface and argument parsing
//!
//! Poet's own options come before the task name; everything after it is
//! handed to the task.

pub mod app;

pub use app::{build_command, parse_globals, run, split_invocation, GlobalOptions, Invocation};
