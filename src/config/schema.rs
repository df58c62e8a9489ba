//! Configuration validation
//!
//! Option/kind compatibility is checked while tasks are built; everything
//! that needs the whole catalog (references, cycles) is checked afterwards.

use crate::config::types::{Catalog, RawTask};
use crate::error::{ConfigError, ConfigResult};
use crate::expr::check_names;
use crate::runner::args::validate_specs;
use crate::runner::task::{SwitchDefault, TaskDefinition, TaskKind, TaskType};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TASK_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-+:]*$").expect("static task name pattern"));

static VAR_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static variable name pattern"));

/// Names bound in script call arguments besides the task's own arguments
const SCRIPT_CALL_NAMES: &[&str] = &["environ", "_dry_run"];

fn option_allowed(task_type: TaskType, key: &str) -> bool {
    use TaskType::*;
    match key {
        "use_exec" => matches!(task_type, Cmd | Shell | Script),
        "capture_stdout" => matches!(task_type, Cmd | Shell | Script | Expr),
        "default_item_type" => matches!(task_type, Sequence | Parallel),
        "interpreter" => task_type == Shell,
        "print_result" => task_type == Script,
        "imports" | "assert" => task_type == Expr,
        "empty_glob" => task_type == Cmd,
        "control" | "default" => task_type == Switch,
        // Only meaningful on switch cases, where it is consumed before this check
        "case" => false,
        _ => true,
    }
}

/// Reject kind-specific options set on a task of another kind
pub fn check_task_options(name: &str, task_type: TaskType, raw: &RawTask) -> ConfigResult<()> {
    for key in raw.kind_options() {
        if !option_allowed(task_type, key) {
            return Err(ConfigError::task(
                name,
                format!("option '{}' is not valid for {} tasks", key, task_type),
            ));
        }
    }
    if raw.use_exec == Some(true) && raw.capture_stdout.is_some() {
        return Err(ConfigError::task(
            name,
            "use_exec cannot be combined with capture_stdout",
        ));
    }
    Ok(())
}

/// Validate a complete catalog
pub fn validate_catalog(catalog: &Catalog) -> ConfigResult<()> {
    for task in catalog.tasks() {
        if !TASK_NAME_PATTERN.is_match(&task.name) {
            return Err(ConfigError::task(
                &task.name,
                "task names must start with a letter or '_' and contain only letters, digits, '_', '-', '+' or ':'",
            ));
        }
        validate_task(catalog, task)?;
    }

    detect_cycles(catalog)
}

/// The task named by an invocation string, if it can be known before templating
fn static_target(invocation: &str) -> Option<&str> {
    invocation
        .split_whitespace()
        .next()
        .filter(|name| !name.contains('$'))
}

fn check_invocation(catalog: &Catalog, owner: &str, invocation: &str) -> ConfigResult<()> {
    if invocation.trim().is_empty() {
        return Err(ConfigError::task(owner, "task invocations must not be empty"));
    }
    match static_target(invocation) {
        Some(target) if !catalog.contains(target) => Err(ConfigError::task(
            owner,
            format!("references unknown task '{}'", target),
        )),
        _ => Ok(()),
    }
}

fn validate_task(catalog: &Catalog, task: &TaskDefinition) -> ConfigResult<()> {
    validate_specs(&task.name, &task.options.args)?;

    for dep in &task.options.deps {
        check_invocation(catalog, &task.name, dep)?;
    }
    for (var, invocation) in &task.options.uses {
        if !VAR_NAME_PATTERN.is_match(var) {
            return Err(ConfigError::task(
                &task.name,
                format!("'{}' is not a valid variable name for uses", var),
            ));
        }
        check_invocation(catalog, &task.name, invocation)?;
    }

    let arg_names = task.arg_names();
    let mut allowed: Vec<&str> = arg_names.iter().map(String::as_str).collect();
    let expression_error = |e: crate::error::ExpressionError| ConfigError::task(&task.name, e.to_string());

    match &task.kind {
        TaskKind::Ref(invocation) => check_invocation(catalog, &task.name, invocation)?,
        TaskKind::Expr(expr) => {
            allowed.extend(expr.imports.iter().map(|m| m.name()));
            check_names(&expr.expr, &allowed).map_err(expression_error)?;
        }
        TaskKind::Script(script) => {
            if let Some(call) = &script.call {
                allowed.extend_from_slice(SCRIPT_CALL_NAMES);
                for arg in call.args.iter().chain(call.kwargs.iter().map(|(_, e)| e)) {
                    check_names(arg, &allowed).map_err(expression_error)?;
                }
            }
        }
        TaskKind::Switch(switch) => {
            let mut seen = HashSet::new();
            let mut defaults = 0;
            for case in &switch.cases {
                if case.is_default() {
                    defaults += 1;
                }
                for value in &case.values {
                    if !seen.insert(value.as_str()) {
                        return Err(ConfigError::task(
                            &task.name,
                            format!("duplicate switch case '{}'", value),
                        ));
                    }
                }
            }
            if defaults > 1 {
                return Err(ConfigError::task(&task.name, "switch has more than one default case"));
            }
            if defaults == 1 && switch.default == SwitchDefault::Pass {
                return Err(ConfigError::task(
                    &task.name,
                    "default: pass cannot be combined with a default case",
                ));
            }
        }
        TaskKind::Cmd(_) | TaskKind::Shell(_) | TaskKind::Sequence(_) | TaskKind::Parallel(_) => {}
    }

    for child in task.children() {
        validate_task(catalog, child)?;
    }
    Ok(())
}

/// Catalog tasks a task can run, directly or through its nested tasks
fn referenced_tasks<'t>(task: &'t TaskDefinition, out: &mut Vec<&'t str>) {
    let invocations = task
        .options
        .deps
        .iter()
        .chain(task.options.uses.iter().map(|(_, invocation)| invocation));
    out.extend(invocations.filter_map(|i| static_target(i)));

    if let TaskKind::Ref(invocation) = &task.kind {
        out.extend(static_target(invocation));
    }
    for child in task.children() {
        referenced_tasks(child, out);
    }
}

fn detect_cycles(catalog: &Catalog) -> ConfigResult<()> {
    let mut visited = HashSet::new();
    for task in catalog.tasks() {
        let mut stack = Vec::new();
        check_task_cycle(catalog, &task.name, &mut visited, &mut stack)?;
    }
    Ok(())
}

fn check_task_cycle<'c>(
    catalog: &'c Catalog,
    task_name: &'c str,
    visited: &mut HashSet<&'c str>,
    stack: &mut Vec<&'c str>,
) -> ConfigResult<()> {
    if stack.contains(&task_name) {
        stack.push(task_name);
        return Err(ConfigError::CyclicDependency(stack.join(" -> ")));
    }
    if visited.contains(task_name) {
        return Ok(());
    }
    let Some(task) = catalog.get(task_name) else {
        return Ok(());
    };

    stack.push(task_name);
    let mut targets = Vec::new();
    referenced_tasks(task, &mut targets);
    for target in targets {
        check_task_cycle(catalog, target, visited, stack)?;
    }
    stack.pop();
    visited.insert(task_name);

    Ok(())
}
