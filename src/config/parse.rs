//! Configuration file discovery and catalog building

use crate::config::schema::{check_task_options, validate_catalog};
use crate::config::types::{
    Catalog, ConfigFile, ExecutorSpec, GlobalConfig, RawArg, RawTask, StringOrList,
};
use crate::env::EnvEntry;
use crate::error::{ConfigError, ConfigResult, Result};
use crate::expand::GlobPolicy;
use crate::expr::{parse_call, parse_expression, Call, Module};
use crate::runner::args::{ArgType, ArgValue, ArgumentSpec, Multiple};
use crate::runner::executor::ExecutorKind;
use crate::runner::task::{
    is_hidden_name, Assertion, CmdTask, ExprTask, IgnoreFail, ScriptTask, ShellTask, SwitchCase,
    SwitchDefault, SwitchTask, TaskDefinition, TaskKind, TaskOptions, TaskType,
};
use serde_yaml::{Mapping, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["poet.yml", "poet.yaml"];

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Load a catalog from a file; its directory becomes the project root
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    parse_catalog(&contents, &root, Some(path))
}

/// Load a catalog with automatic file discovery
pub fn load_catalog_auto() -> Result<Catalog> {
    load_catalog(&find_config_file()?)
}

/// Parse and validate a catalog from YAML text
pub fn parse_catalog(yaml: &str, root: &Path, config_path: Option<&Path>) -> Result<Catalog> {
    let file: ConfigFile = serde_yaml::from_str(yaml)?;
    let global = build_global(&file)?;

    let tasks = {
        let builder = Builder { global: &global };
        let mut tasks = Vec::with_capacity(file.tasks.len());
        for (key, value) in &file.tasks {
            let name = key
                .as_str()
                .ok_or_else(|| ConfigError::Invalid(format!("task names must be strings, got {:?}", key)))?;
            let mut task = builder.task(name, value, global.default_task_type)?;
            task.hidden = is_hidden_name(name);
            tasks.push(task);
        }
        tasks
    };

    let catalog = Catalog::new(
        global,
        tasks,
        root.to_path_buf(),
        config_path.map(Path::to_path_buf),
    );
    validate_catalog(&catalog)?;
    tracing::debug!(tasks = catalog.tasks().len(), root = %catalog.root.display(), "loaded catalog");
    Ok(catalog)
}

fn parse_task_type(key: &str, value: &str) -> ConfigResult<TaskType> {
    TaskType::from_key(value)
        .ok_or_else(|| ConfigError::Invalid(format!("{} '{}' is not a task type", key, value)))
}

fn build_global(file: &ConfigFile) -> ConfigResult<GlobalConfig> {
    let mut global = GlobalConfig {
        env: env_entries("", &file.env)?,
        envfile: file.envfile.clone().map(StringOrList::into_vec).unwrap_or_default(),
        verbosity: file.verbosity.unwrap_or(0),
        ..GlobalConfig::default()
    };

    if let Some(spec) = &file.executor {
        global.executor = executor_kind(spec).map_err(ConfigError::Invalid)?;
    }
    if let Some(interpreter) = &file.shell_interpreter {
        global.shell_interpreter = interpreter.clone().into_vec();
    }
    if let Some(t) = &file.default_task_type {
        global.default_task_type = parse_task_type("default_task_type", t)?;
    }
    if let Some(t) = &file.default_array_task_type {
        let task_type = parse_task_type("default_array_task_type", t)?;
        if !matches!(task_type, TaskType::Sequence | TaskType::Parallel) {
            return Err(ConfigError::Invalid(
                "default_array_task_type must be sequence or parallel".to_string(),
            ));
        }
        global.default_array_task_type = task_type;
    }
    if let Some(t) = &file.default_array_item_task_type {
        global.default_array_item_task_type = parse_task_type("default_array_item_task_type", t)?;
    }

    Ok(global)
}

fn executor_kind(spec: &ExecutorSpec) -> std::result::Result<ExecutorKind, String> {
    let (name, location) = match spec {
        ExecutorSpec::Name(name) => (name.as_str(), None),
        ExecutorSpec::Table { kind, location } => (kind.as_str(), location.clone()),
    };
    match name {
        "simple" => Ok(ExecutorKind::Simple),
        "virtualenv" => Ok(ExecutorKind::Virtualenv { location }),
        other => Err(format!("unknown executor type '{}'", other)),
    }
}

fn yaml_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn env_entries(task: &str, table: &Mapping) -> ConfigResult<Vec<(String, EnvEntry)>> {
    let invalid = |reason: String| {
        if task.is_empty() {
            ConfigError::Invalid(reason)
        } else {
            ConfigError::task(task, reason)
        }
    };

    let mut entries = Vec::with_capacity(table.len());
    for (key, value) in table {
        let key = key
            .as_str()
            .ok_or_else(|| invalid(format!("env keys must be strings, got {:?}", key)))?;
        let entry = match value {
            Value::Mapping(spec) => {
                let default = spec
                    .get("default")
                    .and_then(yaml_scalar)
                    .filter(|_| spec.len() == 1)
                    .ok_or_else(|| invalid(format!("env var '{}' must be a string or {{default: ...}}", key)))?;
                EnvEntry::Default(default)
            }
            other => EnvEntry::Value(
                yaml_scalar(other)
                    .ok_or_else(|| invalid(format!("env var '{}' must be a string", key)))?,
            ),
        };
        entries.push((key.to_string(), entry));
    }
    Ok(entries)
}

fn yaml_to_arg_value(value: &Value) -> Option<ArgValue> {
    match value {
        Value::String(s) => Some(ArgValue::Str(s.clone())),
        Value::Bool(b) => Some(ArgValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(ArgValue::Int)
            .or_else(|| n.as_f64().map(ArgValue::Float)),
        Value::Sequence(items) => items
            .iter()
            .map(yaml_to_arg_value)
            .collect::<Option<Vec<_>>>()
            .map(ArgValue::List),
        _ => None,
    }
}

fn parse_args(task: &str, value: &Value) -> ConfigResult<Vec<ArgumentSpec>> {
    let raw_arg = |item: &Value| -> ConfigResult<RawArg> {
        match item {
            Value::Null => Ok(RawArg::default()),
            other => serde_yaml::from_value(other.clone())
                .map_err(|e| ConfigError::task(task, format!("invalid argument declaration: {}", e))),
        }
    };

    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(name) => Ok(ArgumentSpec::new(name)),
                other => {
                    let raw = raw_arg(other)?;
                    let name = raw
                        .name
                        .clone()
                        .ok_or_else(|| ConfigError::task(task, "argument declarations need a name"))?;
                    argument_spec(task, &name, raw)
                }
            })
            .collect(),
        Value::Mapping(table) => table
            .iter()
            .map(|(key, item)| {
                let name = key
                    .as_str()
                    .ok_or_else(|| ConfigError::task(task, "argument names must be strings"))?;
                argument_spec(task, name, raw_arg(item)?)
            })
            .collect(),
        _ => Err(ConfigError::task(task, "args must be a list or a mapping")),
    }
}

fn argument_spec(task: &str, name: &str, raw: RawArg) -> ConfigResult<ArgumentSpec> {
    let invalid = |reason: String| ConfigError::InvalidArgument {
        task: task.to_string(),
        arg: name.to_string(),
        reason,
    };

    let mut spec = ArgumentSpec::new(name);
    spec.help = raw.help;
    spec.required = raw.required.unwrap_or(false);

    if let Some(type_name) = &raw.arg_type {
        spec.arg_type = ArgType::parse(type_name)
            .ok_or_else(|| invalid(format!("unknown type '{}'", type_name)))?;
    }

    match raw.positional {
        None | Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => spec.positional = true,
        Some(Value::String(display)) => {
            spec.positional = true;
            spec.positional_name = Some(display);
        }
        Some(_) => return Err(invalid("positional must be a boolean or a string".to_string())),
    }

    if spec.positional {
        spec.options = raw.options.unwrap_or_default();
    } else if let Some(options) = raw.options {
        spec.options = options;
    }

    spec.multiple = match raw.multiple {
        None | Some(Value::Bool(false)) => Multiple::Single,
        Some(Value::Bool(true)) => Multiple::Unbounded,
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Multiple::Exactly(n as usize))
            .ok_or_else(|| invalid("multiple must be a boolean or a positive integer".to_string()))?,
        Some(_) => return Err(invalid("multiple must be a boolean or an integer".to_string())),
    };

    spec.default = match raw.default {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            yaml_to_arg_value(&value)
                .ok_or_else(|| invalid("default must be a scalar or a list".to_string()))?,
        ),
    };

    Ok(spec)
}

fn parse_ignore_fail(task: &str, task_type: TaskType, value: &Value) -> ConfigResult<IgnoreFail> {
    let composite = matches!(task_type, TaskType::Sequence | TaskType::Parallel);
    match value {
        Value::Bool(true) => Ok(IgnoreFail::ReturnZero),
        Value::Bool(false) => Ok(IgnoreFail::Never),
        Value::String(s) if s == "return_zero" => Ok(IgnoreFail::ReturnZero),
        Value::String(s) if s == "return_non_zero" && composite => Ok(IgnoreFail::ReturnNonZero),
        Value::Sequence(codes) if !composite => codes
            .iter()
            .map(|c| c.as_i64().and_then(|c| i32::try_from(c).ok()))
            .collect::<Option<Vec<_>>>()
            .map(IgnoreFail::Codes)
            .ok_or_else(|| ConfigError::task(task, "ignore_fail codes must be integers")),
        _ => Err(ConfigError::task(
            task,
            if composite {
                "ignore_fail must be true, 'return_zero' or 'return_non_zero'"
            } else {
                "ignore_fail must be true, 'return_zero' or a list of exit codes"
            },
        )),
    }
}

fn parse_assertion(task: &str, value: &Value) -> ConfigResult<Assertion> {
    match value {
        Value::Bool(true) => Ok(Assertion::Truthy(1)),
        Value::Bool(false) => Ok(Assertion::Off),
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .filter(|&n| n != 0)
            .map(Assertion::Truthy)
            .ok_or_else(|| ConfigError::task(task, "assert must be a boolean or a nonzero exit code")),
        _ => Err(ConfigError::task(task, "assert must be a boolean or an exit code")),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Split `module:callable` or `module:callable(args)` into the registry key
/// and the parsed call
fn parse_script_target(task: &str, content: &str) -> ConfigResult<(String, Option<Call>)> {
    let invalid = || {
        ConfigError::task(
            task,
            format!("invalid script target '{}', expected 'module:callable'", content),
        )
    };

    let (module, callable) = content.trim().split_once(':').ok_or_else(invalid)?;
    let (module, callable) = (module.trim(), callable.trim());
    if !module.split('.').all(is_identifier) {
        return Err(invalid());
    }

    if callable.contains('(') {
        let call = parse_call(callable).map_err(|e| ConfigError::task(task, e.to_string()))?;
        let name = call.dotted_name().ok_or_else(invalid)?;
        Ok((format!("{}:{}", module, name), Some(call)))
    } else if callable.split('.').all(is_identifier) {
        Ok((format!("{}:{}", module, callable), None))
    } else {
        Err(invalid())
    }
}

struct Builder<'a> {
    global: &'a GlobalConfig,
}

impl Builder<'_> {
    /// Build a task from any of its YAML forms; plain strings take `string_type`
    fn task(&self, name: &str, value: &Value, string_type: TaskType) -> ConfigResult<TaskDefinition> {
        let raw = match value {
            Value::String(content) => {
                let mut raw = RawTask::default();
                let content = Some(content.clone());
                match string_type {
                    TaskType::Cmd => raw.cmd = content,
                    TaskType::Shell => raw.shell = content,
                    TaskType::Script => raw.script = content,
                    TaskType::Expr => raw.expr = content,
                    TaskType::Ref => raw.reference = content,
                    other => {
                        return Err(ConfigError::task(
                            name,
                            format!("a {} task cannot be given as a string", other),
                        ))
                    }
                }
                raw
            }
            Value::Sequence(items) => {
                let mut raw = RawTask::default();
                match self.global.default_array_task_type {
                    TaskType::Parallel => raw.parallel = Some(items.clone()),
                    _ => raw.sequence = Some(items.clone()),
                }
                raw
            }
            Value::Mapping(_) => serde_yaml::from_value(value.clone())
                .map_err(|e| ConfigError::task(name, e.to_string()))?,
            _ => {
                return Err(ConfigError::task(
                    name,
                    "a task must be a string, a list or a mapping",
                ))
            }
        };
        self.from_raw(name, raw)
    }

    fn from_raw(&self, name: &str, mut raw: RawTask) -> ConfigResult<TaskDefinition> {
        let task_type = match raw.content_types().as_slice() {
            [single] => *single,
            [] => {
                let keys: Vec<&str> = TaskType::ALL.iter().map(|t| t.key()).collect();
                return Err(ConfigError::task(
                    name,
                    format!("no task content, expected one of: {}", keys.join(", ")),
                ));
            }
            many => {
                let keys: Vec<&str> = many.iter().map(|t| t.key()).collect();
                return Err(ConfigError::task(
                    name,
                    format!("only one task content key is allowed, found: {}", keys.join(", ")),
                ));
            }
        };
        check_task_options(name, task_type, &raw)?;

        let options = self.options(name, task_type, &raw)?;
        let kind = match task_type {
            TaskType::Cmd => TaskKind::Cmd(CmdTask {
                content: raw.cmd.take().unwrap_or_default(),
                empty_glob: match &raw.empty_glob {
                    None => GlobPolicy::default(),
                    Some(policy) => GlobPolicy::parse(policy).ok_or_else(|| {
                        ConfigError::task(name, "empty_glob must be one of: pass, null, fail")
                    })?,
                },
            }),
            TaskType::Shell => TaskKind::Shell(ShellTask {
                content: raw.shell.take().unwrap_or_default(),
                interpreter: raw.interpreter.take().map(StringOrList::into_vec),
            }),
            TaskType::Script => {
                let content = raw.script.take().unwrap_or_default();
                let (target, call) = parse_script_target(name, &content)?;
                TaskKind::Script(ScriptTask {
                    content,
                    target,
                    call,
                    print_result: raw.print_result.unwrap_or(false),
                })
            }
            TaskType::Expr => {
                let content = raw.expr.take().unwrap_or_default();
                let expr = parse_expression(&content)
                    .map_err(|e| ConfigError::task(name, e.to_string()))?;
                let imports = raw
                    .imports
                    .take()
                    .unwrap_or_default()
                    .iter()
                    .map(|m| {
                        Module::from_name(m).ok_or_else(|| {
                            ConfigError::task(name, format!("cannot import unknown module '{}'", m))
                        })
                    })
                    .collect::<ConfigResult<Vec<_>>>()?;
                let assert = match &raw.assertion {
                    None => Assertion::Off,
                    Some(value) => parse_assertion(name, value)?,
                };
                TaskKind::Expr(ExprTask {
                    content,
                    expr,
                    imports,
                    assert,
                })
            }
            TaskType::Sequence | TaskType::Parallel => {
                let item_type = match &raw.default_item_type {
                    Some(t) => parse_task_type("default_item_type", t)?,
                    None => self.global.default_array_item_task_type,
                };
                let items = raw
                    .sequence
                    .take()
                    .or_else(|| raw.parallel.take())
                    .unwrap_or_default();
                let items = self.items(name, &items, item_type)?;
                if task_type == TaskType::Sequence {
                    TaskKind::Sequence(items)
                } else {
                    TaskKind::Parallel(items)
                }
            }
            TaskType::Switch => TaskKind::Switch(self.switch(name, &mut raw)?),
            TaskType::Ref => TaskKind::Ref(raw.reference.take().unwrap_or_default()),
        };

        Ok(TaskDefinition {
            name: name.to_string(),
            hidden: false,
            kind,
            options,
        })
    }

    fn options(&self, name: &str, task_type: TaskType, raw: &RawTask) -> ConfigResult<TaskOptions> {
        let uses = match &raw.uses {
            None => Vec::new(),
            Some(table) => table
                .iter()
                .map(|(key, value)| match (key.as_str(), value.as_str()) {
                    (Some(var), Some(invocation)) => Ok((var.to_string(), invocation.to_string())),
                    _ => Err(ConfigError::task(name, "uses must map variable names to task invocations")),
                })
                .collect::<ConfigResult<Vec<_>>>()?,
        };

        Ok(TaskOptions {
            help: raw.help.clone(),
            args: match &raw.args {
                None => Vec::new(),
                Some(value) => parse_args(name, value)?,
            },
            env: match &raw.env {
                None => Vec::new(),
                Some(table) => env_entries(name, table)?,
            },
            envfile: raw.envfile.clone().map(StringOrList::into_vec).unwrap_or_default(),
            cwd: raw.cwd.clone(),
            deps: raw.deps.clone().unwrap_or_default(),
            uses,
            use_exec: raw.use_exec.unwrap_or(false),
            ignore_fail: match &raw.ignore_fail {
                None => IgnoreFail::Never,
                Some(value) => parse_ignore_fail(name, task_type, value)?,
            },
            capture_stdout: raw.capture_stdout.clone(),
            executor: raw
                .executor
                .as_ref()
                .map(executor_kind)
                .transpose()
                .map_err(|e| ConfigError::task(name, e))?,
            verbosity: raw.verbosity,
        })
    }

    fn items(&self, parent: &str, items: &[Value], item_type: TaskType) -> ConfigResult<Vec<TaskDefinition>> {
        if items.is_empty() {
            return Err(ConfigError::task(parent, "task list must not be empty"));
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.task(&format!("{}[{}]", parent, i), item, item_type))
            .collect()
    }

    fn switch(&self, name: &str, raw: &mut RawTask) -> ConfigResult<SwitchTask> {
        let control = raw
            .control
            .take()
            .ok_or_else(|| ConfigError::task(name, "switch tasks require a control task"))?;
        let control = self.task(&format!("{}[control]", name), &control, self.global.default_task_type)?;

        let default = match raw.default.as_deref() {
            None | Some("fail") => SwitchDefault::Fail,
            Some("pass") => SwitchDefault::Pass,
            Some(other) => {
                return Err(ConfigError::task(
                    name,
                    format!("switch default must be 'pass' or 'fail', not '{}'", other),
                ))
            }
        };

        let mut cases = Vec::new();
        for item in raw.switch.take().unwrap_or_default() {
            if !item.is_mapping() {
                return Err(ConfigError::task(name, "switch cases must be mappings"));
            }
            let mut case: RawTask =
                serde_yaml::from_value(item).map_err(|e| ConfigError::task(name, e.to_string()))?;
            let values = case.case.take().map(StringOrList::into_vec).unwrap_or_default();
            let label = if values.is_empty() {
                "default".to_string()
            } else {
                values.join(",")
            };
            let task = self.from_raw(&format!("{}[{}]", name, label), case)?;
            cases.push(SwitchCase { values, task });
        }

        Ok(SwitchTask {
            control: Box::new(control),
            cases,
            default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> Result<Catalog> {
        parse_catalog(yaml, Path::new("/project"), None)
    }

    #[test]
    fn test_parse_simple_catalog() {
        let catalog = parse(
            r#"
tasks:
  hello: echo "hello"
  _private: echo secret
"#,
        )
        .unwrap();
        assert_eq!(catalog.tasks().len(), 2);
        assert!(matches!(catalog.get("hello").unwrap().kind, TaskKind::Cmd(_)));
        assert!(catalog.get("_private").unwrap().hidden);
        assert_eq!(catalog.visible().count(), 1);
    }

    #[test]
    fn test_task_forms_and_defaults() {
        let catalog = parse(
            r#"
default_task_type: shell
tasks:
  a: echo a
  b: [a, {cmd: echo b}]
  c:
    parallel: [a, "echo c"]
    default_item_type: cmd
"#,
        )
        .unwrap();

        assert!(matches!(catalog.get("a").unwrap().kind, TaskKind::Shell(_)));
        match &catalog.get("b").unwrap().kind {
            TaskKind::Sequence(items) => {
                assert!(matches!(&items[0].kind, TaskKind::Ref(target) if target == "a"));
                assert!(matches!(items[1].kind, TaskKind::Cmd(_)));
                assert_eq!(items[1].name, "b[1]");
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &catalog.get("c").unwrap().kind {
            TaskKind::Parallel(items) => assert!(items.iter().all(|i| matches!(i.kind, TaskKind::Cmd(_)))),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_parse_args_forms() {
        let catalog = parse(
            r#"
tasks:
  listed:
    cmd: echo ${a} ${b}
    args: [a, {name: b, type: integer, default: 3}]
  table:
    cmd: echo ${files}
    args:
      files:
        positional: FILES
        multiple: true
      loud:
        type: boolean
        options: [-l, --loud]
"#,
        )
        .unwrap();

        let listed = &catalog.get("listed").unwrap().options.args;
        assert_eq!(listed[0].options, vec!["--a"]);
        assert_eq!(listed[1].arg_type, ArgType::Integer);
        assert_eq!(listed[1].default, Some(ArgValue::Int(3)));

        let table = &catalog.get("table").unwrap().options.args;
        assert!(table[0].positional);
        assert!(table[0].options.is_empty());
        assert_eq!(table[0].positional_name.as_deref(), Some("FILES"));
        assert_eq!(table[0].multiple, Multiple::Unbounded);
        assert_eq!(table[1].options, vec!["-l", "--loud"]);
    }

    #[test]
    fn test_parse_env_and_uses() {
        let catalog = parse(
            r#"
env:
  STAGE: dev
  PORT: 8080
tasks:
  serve:
    cmd: serve
    env:
      HOST: {default: localhost}
    uses:
      VERSION: version
  version: echo 1.0
"#,
        )
        .unwrap();

        assert_eq!(
            catalog.global.env,
            vec![
                ("STAGE".to_string(), EnvEntry::Value("dev".to_string())),
                ("PORT".to_string(), EnvEntry::Value("8080".to_string())),
            ]
        );
        let serve = catalog.get("serve").unwrap();
        assert_eq!(
            serve.options.env,
            vec![("HOST".to_string(), EnvEntry::Default("localhost".to_string()))]
        );
        assert_eq!(serve.options.uses, vec![("VERSION".to_string(), "version".to_string())]);
    }

    #[test]
    fn test_parse_switch() {
        let catalog = parse(
            r#"
tasks:
  platform:
    control: {expr: sys.platform}
    default: pass
    switch:
      - case: [linux, darwin]
        cmd: echo unix
      - case: win32
        cmd: echo windows
"#,
        )
        .unwrap();

        match &catalog.get("platform").unwrap().kind {
            TaskKind::Switch(switch) => {
                assert!(matches!(switch.control.kind, TaskKind::Expr(_)));
                assert_eq!(switch.cases[0].values, vec!["linux", "darwin"]);
                assert_eq!(switch.cases[1].task.name, "platform[win32]");
                assert_eq!(switch.default, SwitchDefault::Pass);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_parse_script_target() {
        let (target, call) = parse_script_target("t", "pkg.tools:run").unwrap();
        assert_eq!(target, "pkg.tools:run");
        assert!(call.is_none());

        let (target, call) = parse_script_target("t", "poet:rm('dist', verbosity=1)").unwrap();
        assert_eq!(target, "poet:rm");
        let call = call.unwrap();
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.kwargs[0].0, "verbosity");

        assert!(parse_script_target("t", "no_colon").is_err());
        assert!(parse_script_target("t", "pkg:1bad").is_err());
    }

    #[test]
    fn test_ignore_fail_forms() {
        let catalog = parse(
            r#"
tasks:
  a: {cmd: "false", ignore_fail: [1, 2]}
  b: {sequence: [a], ignore_fail: return_non_zero}
"#,
        )
        .unwrap();
        assert_eq!(catalog.get("a").unwrap().options.ignore_fail, IgnoreFail::Codes(vec![1, 2]));
        assert_eq!(catalog.get("b").unwrap().options.ignore_fail, IgnoreFail::ReturnNonZero);

        assert!(parse("tasks:\n  a: {cmd: ls, ignore_fail: return_non_zero}\n").is_err());
    }

    #[test]
    fn test_content_key_errors() {
        assert!(parse("tasks:\n  a: {cmd: ls, shell: ls}\n").is_err());
        assert!(parse("tasks:\n  a: {help: nothing}\n").is_err());
        assert!(parse("tasks:\n  a: 42\n").is_err());
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("poet.yml");
        fs::write(&config_path, "tasks:\n  test: echo test\n").unwrap();

        let found = find_config_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("poet.yaml");
        let sub_dir = temp_dir.path().join("subdir");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&config_path, "tasks:\n  test: echo test\n").unwrap();

        let found = find_config_file_from(sub_dir).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_config_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_catalog_sets_root() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("poet.yml");
        fs::write(&config_path, "tasks:\n  test: echo test\n").unwrap();

        let catalog = load_catalog(&config_path).unwrap();
        assert_eq!(catalog.root, temp_dir.path());
        assert_eq!(catalog.config_dir(), temp_dir.path());
    }
}
