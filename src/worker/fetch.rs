use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::capture::{capture_snapshots, BrowserLauncher};
use crate::error::{Result, ScrapeError};
use crate::fetch::Fetcher;
use crate::scheduler::liveness::WorkerRole;
use crate::scheduler::task::{SnapshotCaptureTask, WebTask};
use crate::scheduler::{Event, FetchTask, JobBoard};
use crate::snapshot::Snapshot;
use crate::storage::Persistence;
use crate::worker::DutyCycle;

/// Fetches pages over HTTP and runs browser captures.
#[derive(Clone)]
pub struct FetchWorker {
    board: Arc<JobBoard>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Persistence>,
    browser: Option<Arc<dyn BrowserLauncher>>,
}

impl FetchWorker {
    pub fn new(
        board: Arc<JobBoard>,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Persistence>,
        browser: Option<Arc<dyn BrowserLauncher>>,
    ) -> Self {
        Self {
            board,
            fetcher,
            storage,
            browser,
        }
    }

    async fn fetch_web_content(&self, task: WebTask) -> Result<()> {
        tracing::info!(job_id = %task.job_id, url = %task.url, "Fetching url");
        let text = self.fetcher.fetch(&task.url).await?;

        let storage = self.storage.clone();
        let path = tokio::task::spawn_blocking(move || storage.write_text(&text)).await??;

        self.board.report_event(Event::WebTaskComplete {
            path,
            job_id: task.job_id,
        })?;
        Ok(())
    }

    async fn capture_web_snapshots(&self, task: SnapshotCaptureTask) -> Result<()> {
        let launcher = self
            .browser
            .clone()
            .ok_or_else(|| ScrapeError::NoBrowser(task.url.clone()))?;
        tracing::info!(job_id = %task.job_id, url = %task.url, "Capturing snapshots");

        let board = self.board.clone();
        let storage = self.storage.clone();
        let job_id = task.job_id;

        let shots = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut shots = 0;
            capture_snapshots(
                launcher.as_ref(),
                &task.url,
                task.driver_script.as_ref(),
                &mut |snapshot: Snapshot| {
                    let paths = snapshot
                        .into_iter()
                        .map(|(label, text)| -> Result<(String, PathBuf)> {
                            Ok((label, storage.write_text(&text)?))
                        })
                        .collect::<Result<BTreeMap<String, PathBuf>>>()?;
                    board.report_event(Event::SnapshotCaptured { paths, job_id })?;
                    shots += 1;
                    Ok(())
                },
            )?;
            board.report_event(Event::SnapshotCaptureComplete { job_id })?;
            Ok(shots)
        })
        .await??;

        tracing::debug!(job_id = %job_id, shots, "Capture finished");
        Ok(())
    }
}

#[async_trait]
impl DutyCycle for FetchWorker {
    type Task = FetchTask;

    fn role(&self) -> WorkerRole {
        WorkerRole::Fetch
    }

    fn request_task(&self) -> Option<FetchTask> {
        self.board.get_web_task()
    }

    async fn execute(&self, task: FetchTask) -> Result<()> {
        match task {
            FetchTask::Web(task) => self.fetch_web_content(task).await,
            FetchTask::SnapshotCapture(task) => self.capture_web_snapshots(task).await,
        }
    }
}
