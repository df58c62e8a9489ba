//! Runners for each task kind

pub mod cmd;
pub mod expr;
pub mod parallel;
pub mod reference;
pub mod script;
pub mod sequence;
pub mod shell;
pub mod switch;

use crate::env::Environment;
use crate::error::Result;
use crate::expr::{Scope, Value};
use crate::runner::args::ResolvedArgs;
use crate::runner::context::RunContext;
use crate::runner::engine::Engine;
use crate::runner::executor::{executor_for, ExecRequest, Program};
use crate::runner::output::{Outcome, OutputMode};
use crate::runner::task::{IgnoreFail, TaskDefinition};
use std::sync::Arc;

/// Everything a kind runner needs for one invocation
pub struct TaskRun<'a> {
    pub engine: &'a Engine,
    pub ctx: &'a RunContext,
    pub task: &'a TaskDefinition,
    pub args: &'a ResolvedArgs,

    /// The task's own environment, arguments included
    pub env: &'a Arc<Environment>,

    pub output: &'a OutputMode,
}

impl TaskRun<'_> {
    /// Launch `program` with the task's executor, or only print it in dry-run mode
    pub fn execute(&self, program: Program, action: &str) -> Result<Outcome> {
        self.ctx.print_action(action);
        if self.ctx.dry_run {
            return Ok(Outcome::ok());
        }

        let kind = self.ctx.executor_kind(self.task);
        let executor = executor_for(&kind, &self.ctx.catalog.root, self.ctx.nested);
        let use_exec = self.task.options.use_exec && self.ctx.is_top_level();
        if self.task.options.use_exec && !use_exec {
            tracing::debug!(task = %self.task.name, "use_exec ignored for a nested task");
        }

        let request = ExecRequest {
            program,
            env: self.env.to_process_env(),
            cwd: self.ctx.cwd.clone(),
            use_exec,
            output: self.output.clone(),
        };
        Ok(executor.execute(request)?)
    }

    /// Run a nested definition under this task's environment
    pub fn run_subtask(&self, task: &TaskDefinition, tokens: &[String], output: &OutputMode) -> Result<Outcome> {
        self.engine.invoke(self.ctx, task, tokens, self.env, output)
    }

    /// `argv` as seen by expressions and scripts: the task name, then free arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.task.name.clone())
            .chain(self.args.leftover.iter().cloned())
            .collect()
    }

    /// An expression scope with the task's arguments bound
    ///
    /// Declared arguments without a value are bound to `None`.
    pub fn scope(&self) -> Scope {
        let mut scope =
            Scope::new(self.env.to_process_env(), self.ctx.cwd.clone()).with_argv(self.argv());
        for (name, value) in &self.args.bindings {
            let value = value.as_ref().map(|v| v.to_value()).unwrap_or(Value::None);
            scope.bind(name.clone(), value);
        }
        scope
    }
}

/// Combine member results under a composite's `ignore_fail` policy
///
/// `failures` holds exit codes of failed members in declaration order.
fn aggregate(policy: &IgnoreFail, failures: &[i32], stdout: String) -> Outcome {
    let code = match (policy, failures.first()) {
        (IgnoreFail::ReturnZero, _) | (_, None) => 0,
        (_, Some(&code)) => code,
    };
    Outcome { code, stdout }
}
