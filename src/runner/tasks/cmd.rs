//! Command tasks: expanded argv, no shell

use crate::error::{ConfigError, Result};
use crate::expand::expand_and_glob;
use crate::runner::executor::Program;
use crate::runner::output::Outcome;
use crate::runner::task::CmdTask;
use crate::runner::tasks::TaskRun;

pub fn run(run: &TaskRun, task: &CmdTask) -> Result<Outcome> {
    let mut argv = expand_and_glob(&task.content, run.env.reader(), &run.ctx.cwd, task.empty_glob)?;
    // Free arguments are appended verbatim
    argv.extend(run.args.leftover.iter().cloned());

    if argv.is_empty() {
        return Err(ConfigError::task(&run.task.name, "command expands to nothing").into());
    }
    let action = argv.join(" ");
    run.execute(Program::Argv(argv), &action)
}
