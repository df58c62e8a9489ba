//! Where a task's standard output goes

use crate::error::{ExecutionError, ExecutionResult};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// One line of output from a parallel member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    pub source: String,
    pub line: String,
}

#[derive(Debug, Clone, Default)]
pub enum OutputMode {
    /// Write straight to our stdout
    #[default]
    Inherit,

    /// Collect into [`Outcome::stdout`]
    Capture,

    /// Truncate and write to a file
    File(PathBuf),

    /// Send line by line to a parallel task's printer
    Stream {
        source: String,
        tx: UnboundedSender<StreamLine>,
    },
}

impl OutputMode {
    /// Route text produced in-process, returning what was captured
    pub fn emit(&self, text: &str) -> ExecutionResult<String> {
        match self {
            OutputMode::Inherit => {
                let mut stdout = io::stdout().lock();
                // A closed stdout is not a task failure
                let _ = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush());
                Ok(String::new())
            }
            OutputMode::Capture => Ok(text.to_string()),
            OutputMode::File(path) => {
                fs::write(path, text).map_err(|e| ExecutionError::CaptureFile {
                    path: path.clone(),
                    error: e.to_string(),
                })?;
                Ok(String::new())
            }
            OutputMode::Stream { source, tx } => {
                for line in text.lines() {
                    let _ = tx.send(StreamLine {
                        source: source.clone(),
                        line: line.to_string(),
                    });
                }
                Ok(String::new())
            }
        }
    }

    pub fn is_capture(&self) -> bool {
        matches!(self, OutputMode::Capture)
    }
}

/// The result of running a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub code: i32,

    /// Captured stdout, empty unless the output mode was [`OutputMode::Capture`]
    pub stdout: String,
}

impl Outcome {
    pub fn ok() -> Self {
        Outcome::default()
    }

    /// A process exit status with nothing captured
    pub fn exited(code: i32) -> Self {
        Outcome {
            code,
            stdout: String::new(),
        }
    }

    pub fn failed(code: i32) -> Self {
        Outcome::exited(code)
    }

    pub fn captured(stdout: String) -> Self {
        Outcome { code: 0, stdout }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}
