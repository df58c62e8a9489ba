//! Script tasks: call a registered in-process callable

use crate::error::{ExecutionError, ExpressionResult, Result};
use crate::expr::{free_names, Value};
use crate::runner::output::Outcome;
use crate::runner::task::ScriptTask;
use crate::runner::tasks::TaskRun;
use crate::scripts::ScriptCall;
use std::collections::BTreeMap;

const DRY_RUN_NAME: &str = "_dry_run";

pub fn run(run: &TaskRun, task: &ScriptTask) -> Result<Outcome> {
    if !run.ctx.scripts.contains(&task.target) {
        return Err(ExecutionError::ScriptNotFound(task.target.clone()).into());
    }

    let (args, kwargs, handles_dry_run) = match &task.call {
        Some(call) => {
            let mut scope = run.scope();
            scope.bind("environ", scope.environ());
            scope.bind(DRY_RUN_NAME, Value::Bool(run.ctx.dry_run));

            let args = call
                .args
                .iter()
                .map(|arg| scope.evaluate(arg))
                .collect::<ExpressionResult<Vec<_>>>()?;
            let mut kwargs = BTreeMap::new();
            for (name, expr) in &call.kwargs {
                kwargs.insert(name.clone(), scope.evaluate(expr)?);
            }
            let handles_dry_run = call
                .args
                .iter()
                .chain(call.kwargs.iter().map(|(_, e)| e))
                .any(|e| free_names(e).contains(&DRY_RUN_NAME));
            (args, kwargs, handles_dry_run)
        }
        // Without a call expression the declared arguments become keywords
        None => {
            let kwargs = run
                .args
                .bindings
                .iter()
                .map(|(name, value)| {
                    let value = value.as_ref().map(|v| v.to_value()).unwrap_or(Value::None);
                    (name.clone(), value)
                })
                .collect();
            (Vec::new(), kwargs, false)
        }
    };

    run.ctx.print_action(&task.content);
    if run.ctx.dry_run && !handles_dry_run {
        return Ok(Outcome::ok());
    }
    if run.task.options.use_exec {
        tracing::debug!(task = %run.task.name, "script tasks run in-process, use_exec has no effect");
    }

    let call = ScriptCall {
        task_name: run.task.name.clone(),
        argv: run.argv(),
        args,
        kwargs,
        env: run.env.to_process_env(),
        cwd: run.ctx.cwd.clone(),
        dry_run: run.ctx.dry_run,
    };

    match run.ctx.scripts.invoke_on(&task.target, call, run.ctx.runtime.as_ref())? {
        Ok(returned) => {
            let mut text = returned.stdout;
            if task.print_result && returned.value != Value::None {
                text.push_str(&format!("{}\n", returned.value));
            }
            let captured = run.output.emit(&text)?;
            Ok(Outcome::captured(captured))
        }
        Err(failure) => {
            if !failure.message.is_empty() {
                run.ctx.print_error(&failure.message);
            }
            Ok(Outcome::failed(failure.code))
        }
    }
}
