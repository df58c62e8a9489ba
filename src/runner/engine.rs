//! The task engine
//!
//! [`Engine`] owns a loaded catalog and runs tasks from it. Each invocation
//! resolves arguments, layers the task's environment over its parent's, runs
//! prerequisites, then hands off to the runner for the task's kind.

use crate::config::Catalog;
use crate::env::Environment;
use crate::error::{ArgumentError, ConfigError, PoetError, Result};
use crate::runner::args::{self, usage};
use crate::runner::context::{RunContext, Verbosity, ACTIVE_VAR, CWD_VAR, PWD_VAR, ROOT_VAR, VERBOSITY_VAR};
use crate::runner::executor::ExecutorKind;
use crate::runner::graph;
use crate::runner::output::{Outcome, OutputMode};
use crate::runner::task::{TaskDefinition, TaskKind};
use crate::runner::tasks::{self, TaskRun};
use crate::scripts::ScriptRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-run settings from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dry_run: bool,
    pub executor: Option<ExecutorKind>,

    /// Added to the configured verbosity level
    pub verbosity_delta: i8,

    /// Directory to treat as the invocation directory
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
    scripts: Arc<ScriptRegistry>,
    host_env: Arc<Environment>,
}

impl Engine {
    pub fn new(catalog: Catalog) -> Self {
        Engine {
            catalog: Arc::new(catalog),
            scripts: Arc::new(ScriptRegistry::new()),
            host_env: Arc::new(Environment::from_host()),
        }
    }

    pub fn with_scripts(mut self, scripts: ScriptRegistry) -> Self {
        self.scripts = Arc::new(scripts);
        self
    }

    /// Replace the environment inherited from the host process
    pub fn with_host_env(mut self, env: Environment) -> Self {
        self.host_env = Arc::new(env);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Tasks that can be run by name, in file order
    pub fn visible_tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.catalog.visible()
    }

    /// Run a task, reporting any error and returning the process exit code
    pub fn run(&self, task: &str, args: &[String], overrides: &RunOverrides) -> i32 {
        match self.try_run(task, args, overrides) {
            Ok(code) => code,
            Err(e) => {
                let ctx = self.context(overrides);
                ctx.print_error(&e.to_string());
                if let (PoetError::Argument(_), Some(definition)) = (&e, self.catalog.get(task)) {
                    if ctx.verbosity >= Verbosity::Quiet {
                        eprintln!("{}", usage(&definition.name, &definition.options.args));
                    }
                }
                e.exit_code()
            }
        }
    }

    /// Run a task with stdout going to our stdout
    pub fn try_run(&self, task: &str, args: &[String], overrides: &RunOverrides) -> Result<i32> {
        Ok(self.run_top_level(task, args, overrides, OutputMode::Inherit)?.code)
    }

    /// Run a task and collect its stdout
    pub fn capture(&self, task: &str, args: &[String], overrides: &RunOverrides) -> Result<Outcome> {
        self.run_top_level(task, args, overrides, OutputMode::Capture)
    }

    fn run_top_level(
        &self,
        name: &str,
        args: &[String],
        overrides: &RunOverrides,
        output: OutputMode,
    ) -> Result<Outcome> {
        let task = self.lookup(name)?;
        if task.hidden {
            return Err(ConfigError::HiddenTask(name.to_string()).into());
        }

        let ctx = self.context(overrides);
        let base_env = Arc::new(self.base_env(&ctx, overrides.cwd.as_deref())?);
        tracing::debug!(task = name, dry_run = ctx.dry_run, "running task");
        self.invoke(&ctx, task, args, &base_env, &output)
    }

    fn context(&self, overrides: &RunOverrides) -> RunContext {
        let level = self
            .catalog
            .global
            .verbosity
            .saturating_add(overrides.verbosity_delta);
        let mut ctx = RunContext::new(Arc::clone(&self.catalog), Arc::clone(&self.scripts))
            .with_verbosity(Verbosity::from_level(level))
            .with_dry_run(overrides.dry_run);
        ctx.executor_override = overrides.executor.clone();
        ctx.nested = self.host_env.contains(ACTIVE_VAR);
        ctx
    }

    /// The environment every top-level task starts from
    fn base_env(&self, ctx: &RunContext, invoked_from: Option<&Path>) -> Result<Environment> {
        let mut env = Environment::layer(&self.host_env);
        let root = &self.catalog.root;
        env.set(ROOT_VAR, root.display().to_string());

        let cwd = match (invoked_from, self.host_env.get_str(CWD_VAR)) {
            (Some(dir), _) => dir.display().to_string(),
            // An enclosing run already recorded where the user started
            (None, Some(inherited)) => inherited,
            (None, None) => std::env::current_dir()
                .unwrap_or_else(|_| root.clone())
                .display()
                .to_string(),
        };
        env.set(CWD_VAR, cwd.clone());
        env.set(PWD_VAR, cwd);
        env.set(VERBOSITY_VAR, ctx.verbosity.level().to_string());

        let conf_dir = self.catalog.config_dir();
        let missing = env.apply_envfiles(&self.catalog.global.envfile, conf_dir, Some(conf_dir))?;
        for path in missing {
            ctx.print_warning(&format!("Poet could not find envfile at {}", path.display()));
        }
        env.apply_entries(&self.catalog.global.env, Some(conf_dir));
        Ok(env)
    }

    /// Find a catalog task by name, hidden tasks included
    pub(crate) fn lookup(&self, name: &str) -> Result<&TaskDefinition> {
        self.catalog
            .get(name)
            .ok_or_else(|| ConfigError::TaskNotFound(name.to_string()).into())
    }

    /// Run `task` with CLI-style `tokens` under `parent_env`
    pub(crate) fn invoke(
        &self,
        ctx: &RunContext,
        task: &TaskDefinition,
        tokens: &[String],
        parent_env: &Arc<Environment>,
        output: &OutputMode,
    ) -> Result<Outcome> {
        let mut ctx = ctx.enter(task)?;
        tracing::debug!(task = %task.name, kind = %task.task_type(), args = ?tokens, "invoking task");

        if task.task_type().is_composite() && task.options.args.is_empty() && !tokens.is_empty() {
            return Err(ArgumentError::NotAccepted {
                task: task.name.clone(),
            }
            .into());
        }
        let resolved = args::resolve(&task.name, &task.options.args, tokens, parent_env)?;

        let mut env = Environment::layer(parent_env);
        let conf_dir = self.catalog.config_dir();
        let missing = env.apply_envfiles(&task.options.envfile, conf_dir, Some(conf_dir))?;
        for path in missing {
            ctx.print_warning(&format!("Poet could not find envfile at {}", path.display()));
        }
        env.apply_entries(&task.options.env, Some(conf_dir));
        resolved.apply_to(&mut env);

        if let Some(cwd) = &task.options.cwd {
            ctx.cwd = self.catalog.root.join(env.fill_template(cwd));
        }

        if let Some(failed) = graph::run_prerequisites(self, &ctx, task, parent_env, &mut env)? {
            return Ok(failed);
        }

        let output = match &task.options.capture_stdout {
            Some(path) => OutputMode::File(self.catalog.root.join(env.fill_template(path))),
            None => output.clone(),
        };
        let env = Arc::new(env);
        let run = TaskRun {
            engine: self,
            ctx: &ctx,
            task,
            args: &resolved,
            env: &env,
            output: &output,
        };

        let mut outcome = match &task.kind {
            TaskKind::Cmd(cmd) => tasks::cmd::run(&run, cmd)?,
            TaskKind::Shell(shell) => tasks::shell::run(&run, shell)?,
            TaskKind::Script(script) => tasks::script::run(&run, script)?,
            TaskKind::Sequence(items) => tasks::sequence::run(&run, items)?,
            TaskKind::Parallel(items) => tasks::parallel::run(&run, items)?,
            TaskKind::Expr(expr) => tasks::expr::run(&run, expr)?,
            TaskKind::Switch(switch) => tasks::switch::run(&run, switch)?,
            TaskKind::Ref(invocation) => tasks::reference::run(&run, invocation)?,
        };

        // Sequence and parallel tasks apply their policy while aggregating
        let aggregated = matches!(task.kind, TaskKind::Sequence(_) | TaskKind::Parallel(_));
        if !aggregated && !outcome.success() && task.options.ignore_fail.absorbs(outcome.code) {
            tracing::debug!(task = %task.name, code = outcome.code, "ignoring failure");
            outcome.code = 0;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_catalog;

    fn engine(yaml: &str) -> Engine {
        let catalog = parse_catalog(yaml, Path::new("."), None).unwrap();
        Engine::new(catalog).with_host_env(Environment::from_vars([("PATH", "/usr/bin:/bin")]))
    }

    fn quiet() -> RunOverrides {
        RunOverrides {
            verbosity_delta: -1,
            ..RunOverrides::default()
        }
    }

    #[test]
    fn test_unknown_and_hidden_tasks() {
        let engine = engine("tasks:\n  _secret: {expr: \"1\"}\n  open: {ref: _secret}\n");
        assert!(matches!(
            engine.capture("missing", &[], &quiet()),
            Err(PoetError::Config(ConfigError::TaskNotFound(_)))
        ));
        assert!(matches!(
            engine.capture("_secret", &[], &quiet()),
            Err(PoetError::Config(ConfigError::HiddenTask(_)))
        ));
        assert_eq!(engine.capture("open", &[], &quiet()).unwrap().stdout, "1\n");
        assert_eq!(engine.visible_tasks().count(), 1);
    }

    #[test]
    fn test_special_vars() {
        let engine = engine("tasks:\n  v: {expr: \"${POET_VERBOSITY} + ' ' + ${POET_ROOT}\"}\n");
        let out = engine.capture("v", &[], &quiet()).unwrap();
        assert_eq!(out.stdout, "-1 .\n");
    }

    #[test]
    fn test_composite_rejects_free_arguments() {
        let engine = engine("tasks:\n  a: {expr: \"1\"}\n  s: [a]\n");
        let err = engine.capture("s", &["x".to_string()], &quiet()).unwrap_err();
        assert!(matches!(err, PoetError::Argument(ArgumentError::NotAccepted { .. })));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_env_layering() {
        let engine = engine(
            r#"
env:
  STAGE: dev
  NAME: global
tasks:
  show:
    expr: "${STAGE} + '/' + ${NAME}"
    env:
      NAME: task
"#,
        );
        assert_eq!(engine.capture("show", &[], &quiet()).unwrap().stdout, "dev/task\n");
    }

    #[test]
    fn test_default_env_entries() {
        let engine = engine(
            r#"
tasks:
  show:
    expr: "${PATH} + ',' + ${FALLBACK}"
    env:
      PATH: {default: nope}
      FALLBACK: {default: used}
"#,
        );
        assert_eq!(
            engine.capture("show", &[], &quiet()).unwrap().stdout,
            "/usr/bin:/bin,used\n"
        );
    }
}
