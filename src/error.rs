//! Error types for Poet

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Poet operations
pub type Result<T> = std::result::Result<T, PoetError>;

/// Main error type for Poet
#[derive(Error, Debug)]
pub enum PoetError {
    /// Task catalog errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Named argument errors
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    /// Command token expansion errors
    #[error("Expansion error: {0}")]
    Expansion(#[from] ExpansionError),

    /// Expression parsing and evaluation errors
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Environment resolution errors
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PoetError {
    /// The process exit code a failed run reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PoetError::Argument(_) => 2,
            _ => 1,
        }
    }
}

/// Task catalog parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid task '{task}': {reason}")]
    InvalidTask { task: String, reason: String },

    #[error("Invalid argument '{arg}' declared for task '{task}': {reason}")]
    InvalidArgument {
        task: String,
        arg: String,
        reason: String,
    },

    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Task '{0}' is hidden and cannot be invoked directly")]
    HiddenTask(String),

    #[error("Cyclic dependency detected: {0}")]
    CyclicDependency(String),
}

impl ConfigError {
    pub fn task(task: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidTask {
            task: task.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while resolving CLI tokens against declared arguments
#[derive(Error, Debug)]
pub enum ArgumentError {
    #[error("Task '{task}' is missing required argument '{name}'")]
    Missing { task: String, name: String },

    #[error("Task '{task}' got unrecognized argument '{token}'")]
    Unrecognized { task: String, token: String },

    #[error("Task '{task}' does not accept arguments")]
    NotAccepted { task: String },

    #[error("Argument '{name}' of task '{task}' expects {expected} value, got '{value}'")]
    InvalidType {
        task: String,
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("Option '{flag}' of task '{task}' expects a value")]
    MissingValue { task: String, flag: String },

    #[error("Option '{flag}' of task '{task}' expects {expected} values, got {got}")]
    WrongValueCount {
        task: String,
        flag: String,
        expected: usize,
        got: usize,
    },

    #[error("Flag '{flag}' of task '{task}' does not take a value")]
    UnexpectedValue { task: String, flag: String },
}

/// Command token expansion errors
#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("{message}, near line {line}, position {position}")]
    Parse {
        message: String,
        line: usize,
        position: usize,
    },

    #[error("Glob pattern '{0}' did not match any files")]
    GlobMiss(String),

    #[error("Invalid glob pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },
}

/// Sandboxed expression errors
#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("Invalid expression: {0}")]
    Parse(String),

    #[error("Invalid variable reference in expression: {0}")]
    InvalidReference(String),

    #[error("{0} is not allowed in expressions")]
    Forbidden(String),

    #[error("{0}")]
    Runtime(String),
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to spawn '{program}': {error}")]
    Spawn { program: String, error: String },

    #[error("Couldn't locate interpreter executable for {0} to run shell task")]
    InterpreterNotFound(String),

    #[error("Script target '{0}' is not registered")]
    ScriptNotFound(String),

    #[error("Invalid script target '{0}', expected 'module:callable'")]
    InvalidScriptTarget(String),

    #[error("Failed to write captured output to '{path}': {error}")]
    CaptureFile { path: PathBuf, error: String },

    #[error("Could not find a virtualenv at '{0}'")]
    VirtualenvNotFound(PathBuf),

    #[error("Async runtime error: {0}")]
    Runtime(String),
}

/// Environment resolution errors
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Failed to parse envfile '{path}': {error}")]
    Parse { path: PathBuf, error: String },
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for argument resolution
pub type ArgumentResult<T> = std::result::Result<T, ArgumentError>;

/// Specialized result type for expansion operations
pub type ExpansionResult<T> = std::result::Result<T, ExpansionError>;

/// Specialized result type for expression operations
pub type ExpressionResult<T> = std::result::Result<T, ExpressionError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for environment operations
pub type EnvironmentResult<T> = std::result::Result<T, EnvironmentError>;
