//! Task definitions
//!
//! A [`TaskDefinition`] is the validated, immutable form of one catalog
//! entry. Its kind is fixed when the catalog is loaded; composite kinds own
//! their nested definitions.

use crate::env::EnvEntry;
use crate::expand::GlobPolicy;
use crate::expr::{Call, Expr, Module};
use crate::runner::args::ArgumentSpec;
use crate::runner::executor::ExecutorKind;
use std::fmt;

/// The eight task kinds, named by their content key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Cmd,
    Shell,
    Script,
    Sequence,
    Parallel,
    Expr,
    Switch,
    Ref,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::Cmd,
        TaskType::Shell,
        TaskType::Script,
        TaskType::Sequence,
        TaskType::Parallel,
        TaskType::Expr,
        TaskType::Switch,
        TaskType::Ref,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TaskType::Cmd => "cmd",
            TaskType::Shell => "shell",
            TaskType::Script => "script",
            TaskType::Sequence => "sequence",
            TaskType::Parallel => "parallel",
            TaskType::Expr => "expr",
            TaskType::Switch => "switch",
            TaskType::Ref => "ref",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        TaskType::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Whether the content is a list of nested tasks
    pub fn is_composite(self) -> bool {
        matches!(self, TaskType::Sequence | TaskType::Parallel | TaskType::Switch)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How a task treats nonzero exit codes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IgnoreFail {
    #[default]
    Never,

    /// Report success whatever happened
    ReturnZero,

    /// Keep going through a composite, but still report a failure at the end
    ReturnNonZero,

    /// Treat these exit codes as success
    Codes(Vec<i32>),
}

impl IgnoreFail {
    /// Whether a failing `code` counts as success for a single task
    pub fn absorbs(&self, code: i32) -> bool {
        match self {
            IgnoreFail::Never | IgnoreFail::ReturnNonZero => false,
            IgnoreFail::ReturnZero => true,
            IgnoreFail::Codes(codes) => codes.contains(&code),
        }
    }

    /// Whether a composite keeps running after a member fails
    pub fn continues(&self) -> bool {
        !matches!(self, IgnoreFail::Never)
    }
}

/// What an expression task does with a falsy result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assertion {
    #[default]
    Off,

    /// Fail with this exit code
    Truthy(i32),
}

/// What a switch does when no case matches and there is no default case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchDefault {
    #[default]
    Fail,
    Pass,
}

#[derive(Debug, Clone)]
pub struct CmdTask {
    pub content: String,
    pub empty_glob: GlobPolicy,
}

#[derive(Debug, Clone)]
pub struct ShellTask {
    pub content: String,

    /// Interpreter preference overriding the global `shell_interpreter`
    pub interpreter: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ScriptTask {
    pub content: String,

    /// `module:callable`
    pub target: String,

    /// The parsed call expression, when the content has one
    pub call: Option<Call>,

    pub print_result: bool,
}

#[derive(Debug, Clone)]
pub struct ExprTask {
    pub content: String,
    pub expr: Expr,
    pub imports: Vec<Module>,
    pub assert: Assertion,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// Values matched against the control output, empty for the default case
    pub values: Vec<String>,
    pub task: TaskDefinition,
}

impl SwitchCase {
    pub fn is_default(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SwitchTask {
    pub control: Box<TaskDefinition>,
    pub cases: Vec<SwitchCase>,
    pub default: SwitchDefault,
}

/// Kind-specific content
#[derive(Debug, Clone)]
pub enum TaskKind {
    Cmd(CmdTask),
    Shell(ShellTask),
    Script(ScriptTask),
    Sequence(Vec<TaskDefinition>),
    Parallel(Vec<TaskDefinition>),
    Expr(ExprTask),
    Switch(SwitchTask),
    /// An invocation string naming another task
    Ref(String),
}

impl TaskKind {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskKind::Cmd(_) => TaskType::Cmd,
            TaskKind::Shell(_) => TaskType::Shell,
            TaskKind::Script(_) => TaskType::Script,
            TaskKind::Sequence(_) => TaskType::Sequence,
            TaskKind::Parallel(_) => TaskType::Parallel,
            TaskKind::Expr(_) => TaskType::Expr,
            TaskKind::Switch(_) => TaskType::Switch,
            TaskKind::Ref(_) => TaskType::Ref,
        }
    }
}

/// Options shared by every kind
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Help text shown in the task listing
    pub help: Option<String>,

    /// Declared named arguments
    pub args: Vec<ArgumentSpec>,

    /// Env entries applied over the parent environment, in declaration order
    pub env: Vec<(String, EnvEntry)>,

    /// Env files loaded before `env`, relative to the project root
    pub envfile: Vec<String>,

    /// Working directory, templated and relative to the project root
    pub cwd: Option<String>,

    /// Invocation strings of tasks to run first
    pub deps: Vec<String>,

    /// Variable name to invocation string; the output is captured into the variable
    pub uses: Vec<(String, String)>,

    /// Replace the current process with the task's process
    pub use_exec: bool,

    pub ignore_fail: IgnoreFail,

    /// File that receives the task's stdout
    pub capture_stdout: Option<String>,

    pub executor: Option<ExecutorKind>,

    /// Verbosity offset applied while the task runs
    pub verbosity: Option<i8>,
}

/// A validated task
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    /// Catalog name, or `parent[index]` for nested tasks
    pub name: String,

    /// Hidden tasks are not listed and cannot be invoked directly
    pub hidden: bool,

    pub kind: TaskKind,

    pub options: TaskOptions,
}

impl TaskDefinition {
    pub fn task_type(&self) -> TaskType {
        self.kind.task_type()
    }

    pub fn help(&self) -> Option<&str> {
        self.options.help.as_deref()
    }

    /// Names of the declared arguments as bound in env and expression scopes
    pub fn arg_names(&self) -> Vec<String> {
        self.options.args.iter().map(ArgumentSpec::var_name).collect()
    }

    /// Nested definitions owned by this task
    pub fn children(&self) -> Vec<&TaskDefinition> {
        match &self.kind {
            TaskKind::Sequence(items) | TaskKind::Parallel(items) => items.iter().collect(),
            TaskKind::Switch(switch) => std::iter::once(switch.control.as_ref())
                .chain(switch.cases.iter().map(|c| &c.task))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Names that start with `_` are hidden
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('_')
}
