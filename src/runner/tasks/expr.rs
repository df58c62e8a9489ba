//! Expression tasks: evaluate and print a sandboxed expression

use crate::error::Result;
use crate::runner::output::Outcome;
use crate::runner::task::{Assertion, ExprTask};
use crate::runner::tasks::TaskRun;

pub fn run(run: &TaskRun, task: &ExprTask) -> Result<Outcome> {
    run.ctx.print_action(task.content.trim());
    if run.ctx.dry_run {
        return Ok(Outcome::ok());
    }

    let mut scope = run.scope();
    for module in &task.imports {
        scope.import(*module);
    }
    let value = scope.evaluate(&task.expr)?;
    tracing::debug!(task = %run.task.name, result = %value.repr(), "evaluated expression");

    let captured = run.output.emit(&format!("{}\n", value))?;
    if let Assertion::Truthy(code) = task.assert {
        if !value.is_truthy() {
            run.ctx.print_error(&format!(
                "Assertion failed for task '{}': {} is falsy",
                run.task.name,
                value.repr()
            ));
            return Ok(Outcome {
                code,
                stdout: captured,
            });
        }
    }
    Ok(Outcome::captured(captured))
}
