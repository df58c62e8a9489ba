//! Configuration types
//!
//! The `Raw*` types mirror the YAML layout of a `poet.yml` file. They are
//! converted into a [`Catalog`] of validated task definitions by
//! [`crate::config::parse`].

use crate::env::EnvEntry;
use crate::runner::executor::ExecutorKind;
use crate::runner::task::{TaskDefinition, TaskType};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level layout of a configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Env vars for every task
    #[serde(default)]
    pub env: Mapping,

    /// Env files for every task
    #[serde(default)]
    pub envfile: Option<StringOrList>,

    #[serde(default)]
    pub executor: Option<ExecutorSpec>,

    /// Interpreter preference for shell tasks
    #[serde(default)]
    pub shell_interpreter: Option<StringOrList>,

    /// Kind of a task given as a plain string
    #[serde(default)]
    pub default_task_type: Option<String>,

    /// Kind of a task given as a list
    #[serde(default)]
    pub default_array_task_type: Option<String>,

    /// Kind of a plain string item inside a sequence or parallel task
    #[serde(default)]
    pub default_array_item_task_type: Option<String>,

    #[serde(default)]
    pub verbosity: Option<i8>,

    /// Task name to task value, in file order
    #[serde(default)]
    pub tasks: Mapping,
}

/// A value given either as one string or a list of strings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

/// `executor: virtualenv` or `executor: {type: virtualenv, location: .venv}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExecutorSpec {
    Name(String),
    Table {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        location: Option<String>,
    },
}

/// A task given as a mapping
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTask {
    pub cmd: Option<String>,
    pub shell: Option<String>,
    pub script: Option<String>,
    pub sequence: Option<Vec<Value>>,
    pub parallel: Option<Vec<Value>>,
    pub expr: Option<String>,
    pub switch: Option<Vec<Value>>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,

    pub help: Option<String>,
    pub args: Option<Value>,
    pub env: Option<Mapping>,
    pub envfile: Option<StringOrList>,
    pub cwd: Option<String>,
    pub deps: Option<Vec<String>>,
    pub uses: Option<Mapping>,
    pub use_exec: Option<bool>,
    pub ignore_fail: Option<Value>,
    pub capture_stdout: Option<String>,
    pub executor: Option<ExecutorSpec>,
    pub verbosity: Option<i8>,

    /// sequence, parallel
    pub default_item_type: Option<String>,
    /// shell
    pub interpreter: Option<StringOrList>,
    /// script
    pub print_result: Option<bool>,
    /// expr
    pub imports: Option<Vec<String>>,
    /// expr
    #[serde(rename = "assert")]
    pub assertion: Option<Value>,
    /// cmd
    pub empty_glob: Option<String>,
    /// switch
    pub control: Option<Value>,
    /// switch: `pass` or `fail`
    pub default: Option<String>,
    /// switch items only
    pub case: Option<StringOrList>,
}

impl RawTask {
    /// The content keys present, as task types
    pub fn content_types(&self) -> Vec<TaskType> {
        let present = [
            (TaskType::Cmd, self.cmd.is_some()),
            (TaskType::Shell, self.shell.is_some()),
            (TaskType::Script, self.script.is_some()),
            (TaskType::Sequence, self.sequence.is_some()),
            (TaskType::Parallel, self.parallel.is_some()),
            (TaskType::Expr, self.expr.is_some()),
            (TaskType::Switch, self.switch.is_some()),
            (TaskType::Ref, self.reference.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(t, is_set)| is_set.then_some(t))
            .collect()
    }

    /// Kind-specific options that are set, by key
    pub fn kind_options(&self) -> Vec<&'static str> {
        let present = [
            ("use_exec", self.use_exec.is_some()),
            ("capture_stdout", self.capture_stdout.is_some()),
            ("default_item_type", self.default_item_type.is_some()),
            ("interpreter", self.interpreter.is_some()),
            ("print_result", self.print_result.is_some()),
            ("imports", self.imports.is_some()),
            ("assert", self.assertion.is_some()),
            ("empty_glob", self.empty_glob.is_some()),
            ("control", self.control.is_some()),
            ("default", self.default.is_some()),
            ("case", self.case.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(key, is_set)| is_set.then_some(key))
            .collect()
    }
}

/// One argument declaration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawArg {
    pub name: Option<String>,
    pub options: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub arg_type: Option<String>,
    pub default: Option<Value>,
    pub required: Option<bool>,
    /// `true`, or the display name of the positional argument
    pub positional: Option<Value>,
    /// `true` for any number of values, or an exact count
    pub multiple: Option<Value>,
    pub help: Option<String>,
}

/// Settings that apply to every task
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub env: Vec<(String, EnvEntry)>,
    pub envfile: Vec<String>,
    pub executor: ExecutorKind,
    pub shell_interpreter: Vec<String>,
    pub default_task_type: TaskType,
    pub default_array_task_type: TaskType,
    pub default_array_item_task_type: TaskType,
    pub verbosity: i8,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            env: Vec::new(),
            envfile: Vec::new(),
            executor: ExecutorKind::Simple,
            shell_interpreter: vec!["posix".to_string()],
            default_task_type: TaskType::Cmd,
            default_array_task_type: TaskType::Sequence,
            default_array_item_task_type: TaskType::Ref,
            verbosity: 0,
        }
    }
}

/// The loaded task catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    pub global: GlobalConfig,

    /// Project root: tasks run here unless they set `cwd`
    pub root: PathBuf,

    /// The file the catalog was loaded from
    pub config_path: Option<PathBuf>,

    tasks: Vec<TaskDefinition>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(
        global: GlobalConfig,
        tasks: Vec<TaskDefinition>,
        root: PathBuf,
        config_path: Option<PathBuf>,
    ) -> Self {
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.name.clone(), i))
            .collect();
        Catalog {
            global,
            root,
            config_path,
            tasks,
            index,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tasks in file order
    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    /// Tasks that may be invoked directly, in file order
    pub fn visible(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.iter().filter(|t| !t.hidden)
    }

    /// Directory of the configuration file, visible as `POET_CONF_DIR`
    pub fn config_dir(&self) -> &Path {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(&self.root)
    }
}
