//! Task prerequisites: `deps` and `uses`

use crate::env::Environment;
use crate::error::{ConfigError, Result};
use crate::expand::expand_words;
use crate::runner::context::RunContext;
use crate::runner::engine::Engine;
use crate::runner::output::{Outcome, OutputMode};
use crate::runner::task::TaskDefinition;
use std::sync::Arc;

/// Split an invocation such as `build --release` into a task name and its
/// arguments, templating against `env`
pub fn parse_invocation(invocation: &str, env: &Environment) -> Result<(String, Vec<String>)> {
    let words = expand_words(invocation, env.reader())?;
    match words.split_first() {
        Some((name, args)) => Ok((name.clone(), args.to_vec())),
        None => Err(ConfigError::Invalid(format!("empty task invocation '{}'", invocation)).into()),
    }
}

/// Collapse captured output into one line: trimmed, whitespace runs squeezed
pub fn compact_output(stdout: &str) -> String {
    stdout.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run a task's deps, then its uses, setting each uses variable in `env`
///
/// Invocations are templated against `env` but the tasks themselves run
/// with `parent_env`. Returns the outcome of the first prerequisite that
/// failed, if any.
pub fn run_prerequisites(
    engine: &Engine,
    ctx: &RunContext,
    task: &TaskDefinition,
    parent_env: &Arc<Environment>,
    env: &mut Environment,
) -> Result<Option<Outcome>> {
    for dep in &task.options.deps {
        let (name, args) = parse_invocation(dep, env)?;
        tracing::debug!(task = %task.name, dep = %name, "running dependency");
        let target = engine.lookup(&name)?;
        let outcome = engine.invoke(ctx, target, &args, parent_env, &OutputMode::Inherit)?;
        if !outcome.success() {
            ctx.print_error(&format!(
                "Dependency '{}' of task '{}' failed with exit code {}",
                name, task.name, outcome.code
            ));
            return Ok(Some(outcome));
        }
    }

    for (var, invocation) in &task.options.uses {
        let (name, args) = parse_invocation(invocation, env)?;
        tracing::debug!(task = %task.name, var = %var, used = %name, "capturing task output");
        let target = engine.lookup(&name)?;
        let outcome = engine.invoke(ctx, target, &args, parent_env, &OutputMode::Capture)?;
        if !outcome.success() {
            ctx.print_error(&format!(
                "Task '{}' used by '{}' failed with exit code {}",
                name, task.name, outcome.code
            ));
            return Ok(Some(Outcome::failed(outcome.code)));
        }
        env.set(var.clone(), compact_output(&outcome.stdout));
    }

    Ok(None)
}
