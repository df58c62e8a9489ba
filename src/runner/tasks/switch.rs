//! Switch tasks: run the case matching a control task's output

use crate::error::Result;
use crate::runner::graph;
use crate::runner::output::{Outcome, OutputMode};
use crate::runner::task::{SwitchDefault, SwitchTask};
use crate::runner::tasks::TaskRun;

pub fn run(run: &TaskRun, switch: &SwitchTask) -> Result<Outcome> {
    if run.ctx.dry_run {
        // The control is not run, so there is nothing to match against
        run.ctx
            .print_action(&format!("<switch on output of {}>", switch.control.name));
        return Ok(Outcome::ok());
    }

    let control = run.run_subtask(&switch.control, &[], &OutputMode::Capture)?;
    if !control.success() {
        run.ctx.print_error(&format!(
            "Switch control of '{}' failed with exit code {}",
            run.task.name, control.code
        ));
        return Ok(Outcome::failed(control.code));
    }
    let value = graph::compact_output(&control.stdout);
    tracing::debug!(task = %run.task.name, value = %value, "switch control value");

    let matched = switch
        .cases
        .iter()
        .find(|case| case.values.iter().any(|v| *v == value))
        .or_else(|| switch.cases.iter().find(|case| case.is_default()));

    match matched {
        Some(case) => run.run_subtask(&case.task, &[], run.output),
        None if switch.default == SwitchDefault::Pass => {
            run.ctx
                .print_debug(&format!("No case matched '{}', passing", value));
            Ok(Outcome::ok())
        }
        None => {
            run.ctx.print_error(&format!(
                "Control value '{}' did not match any cases in switch task '{}'",
                value, run.task.name
            ));
            Ok(Outcome::failed(1))
        }
    }
}
