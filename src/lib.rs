//! Poet - a declarative task runner
//!
//! Tasks are defined in a `poet.yml` file as commands, shell scripts,
//! in-process script callables, expressions, or compositions of other tasks
//! (sequences, parallel groups, switches and references).

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod expand;
pub mod expr;
pub mod runner;
pub mod scripts;

pub use error::{PoetError, Result};
pub use runner::{Engine, RunOverrides};
pub use scripts::ScriptRegistry;

/// Current version of Poet
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
