//! Subprocess spawning

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::executor::ExecRequest;
use crate::runner::output::{Outcome, OutputMode, StreamLine};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::process::{Command, ExitStatus, Stdio};

/// Launch a prepared request and wait for it
pub fn run(request: ExecRequest) -> ExecutionResult<Outcome> {
    let line = request.program.command_line();
    let Some((program, args)) = line.split_first() else {
        return Err(ExecutionError::Spawn {
            program: String::new(),
            error: "empty command".to_string(),
        });
    };
    let spawn_error = |e: std::io::Error| ExecutionError::Spawn {
        program: program.clone(),
        error: e.to_string(),
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&request.cwd)
        .env_clear()
        .envs(&request.env)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit());

    if request.use_exec {
        return exec(command, program);
    }

    match &request.output {
        OutputMode::Inherit => {
            let status = command.stdout(Stdio::inherit()).status().map_err(spawn_error)?;
            Ok(Outcome::exited(exit_code(status)))
        }
        OutputMode::Capture => {
            let output = command.stdout(Stdio::piped()).output().map_err(spawn_error)?;
            Ok(Outcome {
                code: exit_code(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            })
        }
        OutputMode::File(path) => {
            let file = File::create(path).map_err(|e| ExecutionError::CaptureFile {
                path: path.clone(),
                error: e.to_string(),
            })?;
            let status = command.stdout(Stdio::from(file)).status().map_err(spawn_error)?;
            Ok(Outcome::exited(exit_code(status)))
        }
        OutputMode::Stream { source, tx } => {
            let mut child = command.stdout(Stdio::piped()).spawn().map_err(spawn_error)?;
            if let Some(stdout) = child.stdout.take() {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    let _ = tx.send(StreamLine {
                        source: source.clone(),
                        line,
                    });
                }
            }
            let status = child.wait().map_err(spawn_error)?;
            Ok(Outcome::exited(exit_code(status)))
        }
    }
}

#[cfg(unix)]
fn exec(mut command: Command, program: &str) -> ExecutionResult<Outcome> {
    use std::os::unix::process::CommandExt;

    // Only returns on failure
    let error = command.exec();
    Err(ExecutionError::Spawn {
        program: program.to_string(),
        error: error.to_string(),
    })
}

#[cfg(not(unix))]
fn exec(mut command: Command, program: &str) -> ExecutionResult<Outcome> {
    let status = command.status().map_err(|e| ExecutionError::Spawn {
        program: program.to_string(),
        error: e.to_string(),
    })?;
    std::process::exit(exit_code(status));
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}
