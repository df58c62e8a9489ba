//! Shell tasks: content handed to an interpreter as one script

use crate::error::{ArgumentError, ExecutionError, ExecutionResult, Result};
use crate::runner::executor::Program;
use crate::runner::output::Outcome;
use crate::runner::task::ShellTask;
use crate::runner::tasks::TaskRun;
use std::path::PathBuf;

const POSIX_FLAGS: &[&str] = &["-c"];
const POWERSHELL_FLAGS: &[&str] = &["-NoLogo", "-NonInteractive", "-Command"];

pub fn run(run: &TaskRun, task: &ShellTask) -> Result<Outcome> {
    if !run.args.leftover.is_empty() {
        return Err(ArgumentError::NotAccepted {
            task: run.task.name.clone(),
        }
        .into());
    }

    let preference = task
        .interpreter
        .as_ref()
        .unwrap_or(&run.ctx.catalog.global.shell_interpreter);
    let interpreter = resolve_interpreter(preference)?;

    let program = Program::Shell {
        interpreter,
        script: task.content.clone(),
    };
    run.execute(program, task.content.trim())
}

/// Executables to try for an interpreter name, and the flags that make them
/// run a script given on the command line
fn interpreter_candidates(name: &str) -> (Vec<&str>, &'static [&'static str]) {
    match name {
        "posix" => (vec!["sh", "bash", "zsh"], POSIX_FLAGS),
        "sh" | "bash" | "zsh" | "fish" => (vec![name], POSIX_FLAGS),
        "pwsh" | "powershell" => (vec![name], POWERSHELL_FLAGS),
        "python" => (vec!["python3", "python"], POSIX_FLAGS),
        other => (vec![other], POSIX_FLAGS),
    }
}

/// Find the first available interpreter from a preference list
pub fn resolve_interpreter(preference: &[String]) -> ExecutionResult<Vec<String>> {
    for name in preference {
        let (executables, flags) = interpreter_candidates(name);
        let found = executables
            .iter()
            .find_map(|exe| which::which(exe).ok())
            .or_else(|| fallback_location(name));

        if let Some(path) = found {
            tracing::debug!(interpreter = %name, path = %path.display(), "resolved shell interpreter");
            let mut command = vec![path.display().to_string()];
            command.extend(flags.iter().map(|f| f.to_string()));
            return Ok(command);
        }
    }
    Err(ExecutionError::InterpreterNotFound(preference.join(", ")))
}

#[cfg(windows)]
fn fallback_location(name: &str) -> Option<PathBuf> {
    // Git for Windows ships a bash that is usually not on PATH
    if name != "posix" && name != "bash" {
        return None;
    }
    ["ProgramFiles", "ProgramW6432", "ProgramFiles(x86)"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(|dir| PathBuf::from(dir).join("Git").join("bin").join("bash.exe"))
        .find(|path| path.is_file())
}

#[cfg(not(windows))]
fn fallback_location(_name: &str) -> Option<PathBuf> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_posix() {
        let command = resolve_interpreter(&["posix".to_string()]).unwrap();
        assert_eq!(command.len(), 2);
        assert_eq!(command[1], "-c");
    }

    #[test]
    fn test_preference_order_skips_missing() {
        let command =
            resolve_interpreter(&["no-such-shell-xyz".to_string(), "sh".to_string()]).unwrap();
        assert!(command[0].ends_with("sh"));
    }

    #[test]
    fn test_no_interpreter_found() {
        let err = resolve_interpreter(&["no-such-shell-xyz".to_string()]).unwrap_err();
        assert!(err.to_string().contains("no-such-shell-xyz"));
    }
}
