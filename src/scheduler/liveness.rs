use std::fmt;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, ScrapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Fetch,
    Cleaning,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Fetch => write!(f, "fetch"),
            WorkerRole::Cleaning => write!(f, "cleaning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
    Dead,
}

/// Worker-side half of the status channel.
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<WorkerStatus>,
}

impl StatusReporter {
    pub fn channel() -> (Self, watch::Receiver<WorkerStatus>) {
        let (tx, rx) = watch::channel(WorkerStatus::Idle);
        (Self { tx }, rx)
    }

    pub fn set(&self, status: WorkerStatus) {
        // send_replace never fails, even with no receivers left
        self.tx.send_replace(status);
    }
}

/// Driver-side view of one spawned worker.
pub struct WorkerHandle {
    pub role: WorkerRole,
    pub index: usize,
    status: watch::Receiver<WorkerStatus>,
    join: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    pub fn new(
        role: WorkerRole,
        index: usize,
        status: watch::Receiver<WorkerStatus>,
        join: JoinHandle<Result<()>>,
    ) -> Self {
        Self {
            role,
            index,
            status,
            join,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        if self.join.is_finished() {
            WorkerStatus::Dead
        } else {
            *self.status.borrow()
        }
    }

    /// A worker is alive until its loop exits, for any reason, or it
    /// reports itself dead.
    pub fn is_alive(&self) -> bool {
        self.status() != WorkerStatus::Dead
    }
}

/// Tracks every worker spawned for a run.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerHandle>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: WorkerHandle) {
        tracing::info!(role = %handle.role, worker = handle.index, "Worker registered");
        self.workers.push(handle);
    }

    pub fn all_workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Workers whose loop has exited or that reported themselves dead.
    pub fn check_dead_workers(&self) -> Vec<(WorkerRole, usize)> {
        self.workers
            .iter()
            .filter(|w| !w.is_alive())
            .map(|w| (w.role, w.index))
            .collect()
    }

    /// Terminate every worker without waiting for in-flight tasks.
    pub fn abort_all(&self) {
        for worker in &self.workers {
            worker.join.abort();
        }
    }

    /// Wait for every worker to exit, returning the first failure.
    pub async fn join_all(self) -> Result<()> {
        let mut first_err = None;
        for worker in self.workers {
            let outcome = match worker.join.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(ScrapeError::from(e)),
            };
            if let Err(e) = outcome {
                tracing::warn!(role = %worker.role, worker = worker.index, error = %e, "Worker exited with error");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
