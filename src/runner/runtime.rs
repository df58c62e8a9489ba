//! Driving async work from synchronous task code
//!
//! Parallel members run on a runtime's blocking pool, where blocking on that
//! runtime's handle is allowed. Anywhere else an enclosing runtime may be
//! polling us from a worker thread, so work is driven on a runtime we own.

use crate::error::{ExecutionError, ExecutionResult};
use std::future::Future;
use tokio::runtime::{Builder, Handle};

/// Run `future` to completion
///
/// `pool` is the runtime whose blocking pool the caller is running on, if any.
pub fn block_on<F>(pool: Option<&Handle>, future: F) -> ExecutionResult<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    if let Some(handle) = pool {
        return Ok(handle.block_on(future));
    }
    if Handle::try_current().is_err() {
        return drive(future);
    }

    // A runtime we don't own is current and cannot be blocked from here
    std::thread::scope(|scope| {
        scope
            .spawn(|| drive(future))
            .join()
            .map_err(|_| ExecutionError::Runtime("task runtime thread panicked".to_string()))?
    })
}

fn drive<F: Future>(future: F) -> ExecutionResult<F::Output> {
    let runtime = Builder::new_multi_thread()
        .enable_time()
        .thread_name("poet-runtime")
        .build()
        .map_err(|e| ExecutionError::Runtime(e.to_string()))?;
    Ok(runtime.block_on(future))
}
