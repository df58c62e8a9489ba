//! Executors decide how a subprocess is launched
//!
//! The simple executor spawns programs as-is. The virtualenv executor points
//! `PATH` and `VIRTUAL_ENV` at a virtual environment first.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::context::ACTIVE_VAR;
use crate::runner::output::{Outcome, OutputMode};
use crate::runner::process;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_VENV_DIR: &str = ".venv";

/// Which executor a task runs with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutorKind {
    #[default]
    Simple,
    Virtualenv {
        /// Relative to the project root, `.venv` when unset
        location: Option<String>,
    },
}

impl ExecutorKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "simple" => Some(ExecutorKind::Simple),
            "virtualenv" => Some(ExecutorKind::Virtualenv { location: None }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutorKind::Simple => "simple",
            ExecutorKind::Virtualenv { .. } => "virtualenv",
        }
    }
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// A program and its arguments
    Argv(Vec<String>),

    /// Script content handed to an interpreter command line
    Shell {
        interpreter: Vec<String>,
        script: String,
    },
}

impl Program {
    /// The full command line
    pub fn command_line(&self) -> Vec<String> {
        match self {
            Program::Argv(argv) => argv.clone(),
            Program::Shell {
                interpreter,
                script,
            } => {
                let mut line = interpreter.clone();
                line.push(script.clone());
                line
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: Program,

    /// The complete child environment
    pub env: BTreeMap<String, String>,

    pub cwd: PathBuf,

    /// Replace the current process instead of spawning a child
    pub use_exec: bool,

    pub output: OutputMode,
}

pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Adjust a request before it is launched
    fn prepare(&self, _request: &mut ExecRequest) -> ExecutionResult<()> {
        Ok(())
    }

    fn execute(&self, mut request: ExecRequest) -> ExecutionResult<Outcome> {
        self.prepare(&mut request)?;
        request
            .env
            .insert(ACTIVE_VAR.to_string(), self.name().to_string());
        tracing::debug!(
            executor = self.name(),
            program = ?request.program.command_line(),
            cwd = %request.cwd.display(),
            "launching"
        );
        process::run(request)
    }
}

pub struct SimpleExecutor;

impl Executor for SimpleExecutor {
    fn name(&self) -> &'static str {
        "simple"
    }
}

pub struct VirtualenvExecutor {
    location: PathBuf,
}

impl VirtualenvExecutor {
    pub fn new(location: PathBuf) -> Self {
        VirtualenvExecutor { location }
    }

    fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.location.join("Scripts")
        } else {
            self.location.join("bin")
        }
    }
}

impl Executor for VirtualenvExecutor {
    fn name(&self) -> &'static str {
        "virtualenv"
    }

    fn prepare(&self, request: &mut ExecRequest) -> ExecutionResult<()> {
        let bin = self.bin_dir();
        if !bin.is_dir() {
            return Err(ExecutionError::VirtualenvNotFound(self.location.clone()));
        }

        let mut paths = vec![bin.clone()];
        if let Some(existing) = request.env.get("PATH") {
            paths.extend(env::split_paths(existing));
        }
        let path = env::join_paths(paths).map_err(|e| ExecutionError::Spawn {
            program: self.location.display().to_string(),
            error: e.to_string(),
        })?;
        request
            .env
            .insert("PATH".to_string(), path.to_string_lossy().into_owned());
        request.env.insert(
            "VIRTUAL_ENV".to_string(),
            self.location.display().to_string(),
        );
        request.env.remove("PYTHONHOME");

        // Prefer the venv's own copy of the program
        if let Program::Argv(argv) = &mut request.program {
            if let Some(first) = argv.first_mut() {
                let candidate = bin.join(first.as_str());
                if candidate.is_file() {
                    *first = candidate.display().to_string();
                }
            }
        }
        Ok(())
    }
}

/// The executor for `kind`; inside a nested run everything runs simply
pub fn executor_for(kind: &ExecutorKind, root: &Path, nested: bool) -> Box<dyn Executor> {
    match kind {
        ExecutorKind::Simple => Box::new(SimpleExecutor),
        ExecutorKind::Virtualenv { .. } if nested => {
            tracing::debug!("already inside a poet run, using the simple executor");
            Box::new(SimpleExecutor)
        }
        ExecutorKind::Virtualenv { location } => Box::new(VirtualenvExecutor::new(
            root.join(location.as_deref().unwrap_or(DEFAULT_VENV_DIR)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn request(argv: &[&str]) -> ExecRequest {
        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), "/usr/bin".to_string());
        env.insert("PYTHONHOME".to_string(), "/opt/python".to_string());
        ExecRequest {
            program: Program::Argv(argv.iter().map(|s| s.to_string()).collect()),
            env,
            cwd: PathBuf::from("."),
            use_exec: false,
            output: OutputMode::Capture,
        }
    }

    #[test]
    fn test_executor_kind_names() {
        assert_eq!(ExecutorKind::from_name("simple"), Some(ExecutorKind::Simple));
        assert_eq!(
            ExecutorKind::from_name("virtualenv").map(|k| k.name()),
            Some("virtualenv")
        );
        assert_eq!(ExecutorKind::from_name("poetry"), None);
    }

    #[test]
    fn test_virtualenv_missing() {
        let dir = TempDir::new().unwrap();
        let executor = VirtualenvExecutor::new(dir.path().join("nope"));
        let err = executor.prepare(&mut request(&["tool"])).unwrap_err();
        assert!(matches!(err, ExecutionError::VirtualenvNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_virtualenv_prepends_bin() {
        let dir = TempDir::new().unwrap();
        let venv = dir.path().join(".venv");
        fs::create_dir_all(venv.join("bin")).unwrap();
        fs::write(venv.join("bin").join("tool"), "").unwrap();

        let executor = VirtualenvExecutor::new(venv.clone());
        let mut req = request(&["tool", "--flag"]);
        executor.prepare(&mut req).unwrap();

        let path = req.env.get("PATH").unwrap();
        assert!(path.starts_with(&venv.join("bin").display().to_string()));
        assert!(path.ends_with("/usr/bin"));
        assert_eq!(req.env.get("VIRTUAL_ENV"), Some(&venv.display().to_string()));
        assert!(!req.env.contains_key("PYTHONHOME"));
        match req.program {
            Program::Argv(argv) => {
                assert_eq!(argv[0], venv.join("bin").join("tool").display().to_string());
                assert_eq!(argv[1], "--flag");
            }
            other => panic!("unexpected program {:?}", other),
        }
    }

    #[test]
    fn test_nested_runs_use_simple_executor() {
        let kind = ExecutorKind::Virtualenv { location: None };
        assert_eq!(executor_for(&kind, Path::new("."), true).name(), "simple");
        assert_eq!(executor_for(&kind, Path::new("."), false).name(), "virtualenv");
    }
}
