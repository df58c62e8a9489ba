//! Sequence tasks: run members one after another

use crate::error::Result;
use crate::runner::output::Outcome;
use crate::runner::task::TaskDefinition;
use crate::runner::tasks::{aggregate, TaskRun};

pub fn run(run: &TaskRun, items: &[TaskDefinition]) -> Result<Outcome> {
    let policy = &run.task.options.ignore_fail;
    let mut stdout = String::new();
    let mut failures = Vec::new();

    for item in items {
        let outcome = run.run_subtask(item, &[], run.output)?;
        stdout.push_str(&outcome.stdout);
        if outcome.success() {
            continue;
        }
        if !policy.continues() {
            tracing::debug!(task = %run.task.name, step = %item.name, code = outcome.code, "sequence stopped");
            return Ok(Outcome {
                code: outcome.code,
                stdout,
            });
        }
        run.ctx.print_debug(&format!(
            "Step '{}' failed with exit code {}, continuing",
            item.name, outcome.code
        ));
        failures.push(outcome.code);
    }

    Ok(aggregate(policy, &failures, stdout))
}
