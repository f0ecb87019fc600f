use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::scheduler::liveness::WorkerRole;
use crate::scheduler::{CleanTask, Event, JobBoard};
use crate::snapshot::Snapshot;
use crate::storage::Persistence;
use crate::worker::fanout::{fan_out, FanOutSummary, JobSink};
use crate::worker::DutyCycle;

/// Runs cleaners over fetched content and fans their output out.
#[derive(Clone)]
pub struct CleaningWorker {
    board: Arc<JobBoard>,
    storage: Arc<dyn Persistence>,
}

impl CleaningWorker {
    pub fn new(board: Arc<JobBoard>, storage: Arc<dyn Persistence>) -> Self {
        Self { board, storage }
    }
}

/// Load the task's raw content, invoke its cleaner and fan out the result.
pub fn clean_raw_data(
    task: &CleanTask,
    jobs: &dyn JobSink,
    storage: &dyn Persistence,
) -> Result<FanOutSummary> {
    let cleaner = task.cleaner();
    let output = match task {
        CleanTask::Cleaning(t) => {
            let raw = storage.read_text(&t.path)?;
            cleaner.clean_text(&raw)?
        }
        CleanTask::SnapshotCleaning(t) => {
            let snapshot = t
                .paths
                .iter()
                .map(|(label, path)| -> Result<(String, String)> {
                    Ok((label.clone(), storage.read_text(path)?))
                })
                .collect::<Result<Snapshot>>()?;
            cleaner.clean_snapshot(&snapshot)?
        }
    };
    fan_out(output, cleaner.as_ref(), jobs, storage)
}

#[async_trait]
impl DutyCycle for CleaningWorker {
    type Task = CleanTask;

    fn role(&self) -> WorkerRole {
        WorkerRole::Cleaning
    }

    fn request_task(&self) -> Option<CleanTask> {
        self.board.get_cleaning_task()
    }

    async fn execute(&self, task: CleanTask) -> Result<()> {
        let job_id = task.job_id();
        tracing::info!(job_id = %job_id, cleaner = %task.cleaner().name(), "Cleaning data");

        let board = self.board.clone();
        let storage = self.storage.clone();
        let summary = tokio::task::spawn_blocking(move || {
            clean_raw_data(&task, board.as_ref(), storage.as_ref())
        })
        .await??;

        tracing::debug!(
            job_id = %job_id,
            jobs_posted = summary.jobs_posted,
            records = summary.records,
            batches = summary.batches,
            "Cleaning finished"
        );
        self.board
            .report_event(Event::CleaningTaskComplete { job_id })?;
        Ok(())
    }
}
