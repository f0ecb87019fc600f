//! Workers that pull tasks from the job board and report completions.
//!
//! Every worker follows the same duty cycle:
//!
//! 1. Wait for the request throttle ([`TaskRequestThrottle`])
//! 2. Ask the board for a task of its role; if there is none, go again
//! 3. Run the task's unit of work off the board's critical path
//! 4. Report the completion event(s) back to the board
//!
//! # Roles
//!
//! - [`FetchWorker`]: HTTP fetches and browser snapshot captures
//! - [`CleaningWorker`]: cleaner invocation and [`fanout`] of its output
//!
//! A failure inside a task is not retried. It ends the worker's loop and
//! the worker is reported dead, which the driver turns into a run abort.

pub mod clean;
pub mod fanout;
pub mod fetch;
pub mod throttle;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::scheduler::liveness::{StatusReporter, WorkerRole, WorkerStatus};

pub use clean::CleaningWorker;
pub use fanout::{fan_out, FanOutSummary, JobSink};
pub use fetch::FetchWorker;
pub use throttle::TaskRequestThrottle;

/// The role-specific half of a worker: how it asks for work and how it
/// carries a task out.
#[async_trait]
pub trait DutyCycle: Send + Sync {
    type Task: Send;

    fn role(&self) -> WorkerRole;

    /// Ask the job board for the next task of this role.
    fn request_task(&self) -> Option<Self::Task>;

    /// Perform the task and report its completion to the board.
    async fn execute(&self, task: Self::Task) -> Result<()>;
}

/// Run `worker` until `shutdown` fires or a task fails.
///
/// Shutdown is only observed between tasks; a dispatched task always runs
/// to completion.
pub async fn run_duty_cycle<W: DutyCycle>(
    worker: W,
    index: usize,
    status: StatusReporter,
    mut throttle: TaskRequestThrottle,
    shutdown: CancellationToken,
) -> Result<()> {
    let role = worker.role();
    tracing::debug!(%role, worker = index, "Worker started");

    let result = duty_loop(&worker, &status, &mut throttle, &shutdown).await;

    match &result {
        Ok(()) => tracing::debug!(%role, worker = index, "Worker stopped"),
        Err(e) => {
            tracing::error!(%role, worker = index, error = %e, "Worker died");
            status.set(WorkerStatus::Dead);
        }
    }
    result
}

async fn duty_loop<W: DutyCycle>(
    worker: &W,
    status: &StatusReporter,
    throttle: &mut TaskRequestThrottle,
    shutdown: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            _ = throttle.wait() => {}
        }

        let Some(task) = worker.request_task() else {
            continue;
        };

        status.set(WorkerStatus::Busy);
        worker.execute(task).await?;
        status.set(WorkerStatus::Idle);
    }
}
