//! Ref tasks: run another catalog task by invocation string

use crate::error::Result;
use crate::runner::graph::parse_invocation;
use crate::runner::output::Outcome;
use crate::runner::tasks::TaskRun;

pub fn run(run: &TaskRun, invocation: &str) -> Result<Outcome> {
    let (name, mut args) = parse_invocation(invocation, run.env)?;
    args.extend(run.args.leftover.iter().cloned());

    let target = run.engine.lookup(&name)?;
    run.run_subtask(target, &args, run.output)
}
