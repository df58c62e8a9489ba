//! In-process callables for script tasks
//!
//! A script task names its target as `module:callable`. Targets are looked up
//! in a [`ScriptRegistry`] supplied by the embedding program; the registry
//! ships the `poet:rm` and `poet:echo` helpers.

use crate::error::{ExecutionError, ExecutionResult};
use crate::expr::Value;
use crate::runner::runtime;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Everything a callable receives
#[derive(Debug, Clone, Default)]
pub struct ScriptCall {
    pub task_name: String,

    /// The task name followed by free CLI arguments
    pub argv: Vec<String>,

    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub dry_run: bool,
}

impl ScriptCall {
    fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }
}

/// What a callable produced
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptReturn {
    /// Text the callable printed
    pub stdout: String,

    /// The return value, printed with `print_result`
    pub value: Value,
}

impl ScriptReturn {
    pub fn value(value: Value) -> Self {
        ScriptReturn {
            stdout: String::new(),
            value,
        }
    }

    pub fn printed(stdout: impl Into<String>) -> Self {
        ScriptReturn {
            stdout: stdout.into(),
            value: Value::None,
        }
    }
}

/// A callable that exited unsuccessfully
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFailure {
    pub code: i32,
    pub message: String,
}

impl ScriptFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        ScriptFailure {
            code,
            message: message.into(),
        }
    }
}

pub type ScriptResult = std::result::Result<ScriptReturn, ScriptFailure>;

pub type ScriptFuture = Pin<Box<dyn Future<Output = ScriptResult> + Send>>;

#[derive(Clone)]
pub enum ScriptFn {
    Sync(Arc<dyn Fn(ScriptCall) -> ScriptResult + Send + Sync>),
    Async(Arc<dyn Fn(ScriptCall) -> ScriptFuture + Send + Sync>),
}

impl fmt::Debug for ScriptFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptFn::Sync(_) => f.write_str("ScriptFn::Sync"),
            ScriptFn::Async(_) => f.write_str("ScriptFn::Async"),
        }
    }
}

/// Callables addressable from script tasks
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    scripts: HashMap<String, ScriptFn>,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        let mut registry = ScriptRegistry::empty();
        registry.register("poet:rm", rm);
        registry.register("poet:echo", echo);
        registry
    }
}

impl ScriptRegistry {
    /// A registry with the built-in `poet` helpers
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        ScriptRegistry {
            scripts: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, target: &str, callable: F)
    where
        F: Fn(ScriptCall) -> ScriptResult + Send + Sync + 'static,
    {
        self.scripts
            .insert(target.to_string(), ScriptFn::Sync(Arc::new(callable)));
    }

    pub fn register_async<F, Fut>(&mut self, target: &str, callable: F)
    where
        F: Fn(ScriptCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScriptResult> + Send + 'static,
    {
        let boxed = move |call: ScriptCall| -> ScriptFuture { Box::pin(callable(call)) };
        self.scripts
            .insert(target.to_string(), ScriptFn::Async(Arc::new(boxed)));
    }

    pub fn contains(&self, target: &str) -> bool {
        self.scripts.contains_key(target)
    }

    /// Invoke a registered callable, driving async ones to completion
    pub fn invoke(&self, target: &str, call: ScriptCall) -> ExecutionResult<ScriptResult> {
        self.invoke_on(target, call, None)
    }

    /// Like [`ScriptRegistry::invoke`], from a thread of `pool`'s blocking pool
    pub fn invoke_on(
        &self,
        target: &str,
        call: ScriptCall,
        pool: Option<&Handle>,
    ) -> ExecutionResult<ScriptResult> {
        let callable = self
            .scripts
            .get(target)
            .ok_or_else(|| ExecutionError::ScriptNotFound(target.to_string()))?;

        tracing::debug!(target, args = call.args.len(), "invoking script");
        match callable {
            ScriptFn::Sync(f) => Ok(f(call)),
            ScriptFn::Async(f) => runtime::block_on(pool, f(call)),
        }
    }
}

/// `poet:echo(*words)`: print the positional arguments
fn echo(call: ScriptCall) -> ScriptResult {
    let words: Vec<String> = call.args.iter().map(Value::to_string).collect();
    Ok(ScriptReturn::printed(format!("{}\n", words.join(" "))))
}

/// `poet:rm(*patterns, cwd=".", verbosity=0, dry_run=False)`: delete files and
/// directories matching glob patterns
fn rm(call: ScriptCall) -> ScriptResult {
    let base = match call.kwarg("cwd") {
        Some(Value::Str(dir)) => call.cwd.join(dir),
        _ => call.cwd.clone(),
    };
    let verbosity = match call.kwarg("verbosity") {
        Some(Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ScriptFailure::new(1, format!("invalid verbosity '{}'", s)))?,
        Some(Value::Int(i)) => *i,
        _ => 0,
    };
    let dry_run = call
        .kwarg("dry_run")
        .map(Value::is_truthy)
        .unwrap_or(false);

    let mut out = String::new();
    for pattern in &call.args {
        let pattern = pattern.to_string();
        let full = base.join(&pattern);
        let matches: Vec<PathBuf> = glob::glob(&full.to_string_lossy())
            .map_err(|e| ScriptFailure::new(1, format!("invalid pattern '{}': {}", pattern, e)))?
            .filter_map(|entry| entry.ok())
            .collect();

        if verbosity > 0 && matches.is_empty() {
            out.push_str(&format!(
                "No files or directories to delete matching '{}'\n",
                pattern
            ));
        } else if verbosity >= 0 && matches.len() > 1 {
            out.push_str(&format!("Deleting paths matching '{}'\n", pattern));
        }

        for path in matches {
            delete_path(&path, verbosity, dry_run, &mut out)
                .map_err(|e| ScriptFailure::new(1, format!("{}: {}", path.display(), e)))?;
        }
    }

    Ok(ScriptReturn::printed(out))
}

fn delete_path(path: &Path, verbosity: i64, dry_run: bool, out: &mut String) -> std::io::Result<()> {
    if path.is_dir() {
        if verbosity > 0 {
            out.push_str(&format!("Deleting directory '{}'\n", path.display()));
        }
        if !dry_run {
            fs::remove_dir_all(path)?;
        }
    } else {
        if verbosity > 0 {
            out.push_str(&format!("Deleting file '{}'\n", path.display()));
        }
        if !dry_run {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}
