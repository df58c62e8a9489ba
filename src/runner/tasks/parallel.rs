//! Parallel tasks: run members concurrently and interleave their output
//!
//! Members run on tokio's blocking pool, nested parallel tasks on the same
//! pool as their parent. Each streams its stdout line by line
//! to a single printer, which prefixes lines with the member's name when
//! writing to the terminal.

use crate::error::{ExecutionError, PoetError, Result};
use crate::runner::output::{Outcome, OutputMode, StreamLine};
use crate::runner::runtime;
use crate::runner::task::{TaskDefinition, TaskKind};
use crate::runner::tasks::{aggregate, TaskRun};
use colored::Colorize;
use futures::future::join_all;
use std::io::Write;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Name shown in front of a member's output lines
fn label(item: &TaskDefinition) -> String {
    match &item.kind {
        TaskKind::Ref(invocation) => invocation
            .split_whitespace()
            .next()
            .unwrap_or(&item.name)
            .to_string(),
        _ => item.name.clone(),
    }
}

pub fn run(run: &TaskRun, items: &[TaskDefinition]) -> Result<Outcome> {
    let (tx, mut rx) = mpsc::unbounded_channel::<StreamLine>();
    let members: Vec<_> = items
        .iter()
        .map(|item| {
            let output = OutputMode::Stream {
                source: label(item),
                tx: tx.clone(),
            };
            (run.engine.clone(), run.ctx.clone(), Arc::clone(run.env), item.clone(), output)
        })
        .collect();
    // The printer stops once every member has dropped its sender
    drop(tx);

    let parent_output = run.output.clone();
    let printer = async move {
        let mut captured = String::new();
        while let Some(StreamLine { source, line }) = rx.recv().await {
            match &parent_output {
                OutputMode::Inherit => {
                    let mut stdout = std::io::stdout().lock();
                    let _ = writeln!(stdout, "{} {} {}", source.cyan(), "|".dimmed(), line);
                }
                OutputMode::Stream { tx, .. } => {
                    let _ = tx.send(StreamLine { source, line });
                }
                OutputMode::Capture | OutputMode::File(_) => {
                    captured.push_str(&line);
                    captured.push('\n');
                }
            }
        }
        captured
    };

    let fan_out = async move {
        let pool = Handle::current();
        let handles: Vec<_> = members
            .into_iter()
            .map(|(engine, mut ctx, env, item, output)| {
                ctx.runtime = Some(pool.clone());
                tokio::task::spawn_blocking(move || engine.invoke(&ctx, &item, &[], &env, &output))
            })
            .collect();
        futures::join!(join_all(handles), printer)
    };
    let (results, captured) = runtime::block_on(run.ctx.runtime.as_ref(), fan_out)?;

    let policy = &run.task.options.ignore_fail;
    let mut failures = Vec::new();
    let mut first_error: Option<PoetError> = None;
    for (item, joined) in items.iter().zip(results) {
        let result = joined.map_err(|e| PoetError::from(ExecutionError::Runtime(e.to_string())));
        match result.and_then(|r| r) {
            Ok(outcome) if outcome.success() => {}
            Ok(outcome) => {
                run.ctx.print_debug(&format!(
                    "Parallel member '{}' failed with exit code {}",
                    item.name, outcome.code
                ));
                failures.push(outcome.code);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let stdout = match run.output {
        OutputMode::Capture => captured,
        OutputMode::File(_) => {
            run.output.emit(&captured)?;
            String::new()
        }
        _ => String::new(),
    };
    Ok(aggregate(policy, &failures, stdout))
}
