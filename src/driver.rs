use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::capture::BrowserLauncher;
use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::scheduler::job::{JobId, NewJob};
use crate::scheduler::liveness::{StatusReporter, WorkerHandle, WorkerRegistry};
use crate::scheduler::JobBoard;
use crate::storage::{FileStorage, Persistence};
use crate::worker::{run_duty_cycle, CleaningWorker, DutyCycle, FetchWorker, TaskRequestThrottle};

/// Summary of a run that drained every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Job and snapshot-unit ids handed out, including jobs spawned by
    /// cleaners.
    pub ids_minted: u64,
    pub elapsed: Duration,
}

/// Owns one scraping run: the job board, the collaborators and the
/// workers spawned against them.
///
/// The board lives as long as the `Scraper`; [`Scraper::run`] returns once
/// no job remains in any stage and every worker has been joined.
pub struct Scraper {
    config: ScraperConfig,
    board: Arc<JobBoard>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Persistence>,
    browser: Option<Arc<dyn BrowserLauncher>>,
}

impl Scraper {
    /// Scraper backed by HTTP fetching and file storage under
    /// `config.data_dir`.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        let storage = Arc::new(FileStorage::new(config.data_dir.clone()));
        Ok(Self::with_collaborators(config, fetcher, storage))
    }

    pub fn with_collaborators(
        config: ScraperConfig,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            config,
            board: Arc::new(JobBoard::new()),
            fetcher,
            storage,
            browser: None,
        }
    }

    /// Enable driver-script jobs.
    pub fn with_browser(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = Some(launcher);
        self
    }

    pub fn board(&self) -> &Arc<JobBoard> {
        &self.board
    }

    pub fn submit<I>(&self, jobs: I) -> Vec<JobId>
    where
        I: IntoIterator<Item = NewJob>,
    {
        jobs.into_iter().map(|job| self.board.post(job)).collect()
    }

    pub async fn run(self) -> Result<RunOutcome> {
        self.run_until(CancellationToken::new()).await
    }

    /// Run until the board drains, a worker dies or `interrupt` fires.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::WorkerDead`] if any worker dies while jobs remain;
    ///   the other workers are terminated without waiting for queued work
    /// - [`ScrapeError::Interrupted`] if `interrupt` is cancelled; workers
    ///   finish their in-flight task and stop
    pub async fn run_until(self, interrupt: CancellationToken) -> Result<RunOutcome> {
        let started = Instant::now();
        let shutdown = CancellationToken::new();
        let registry = self.spawn_workers(&shutdown);

        tracing::info!(
            fetch_workers = self.config.fetch_workers,
            cleaning_workers = self.config.cleaning_workers,
            queued = self.board.counts().total(),
            "Scrape started"
        );

        let mut check = tokio::time::interval(self.config.liveness_check_interval());
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    tracing::warn!(counts = ?self.board.counts(), "Interrupted, stopping workers");
                    shutdown.cancel();
                    if let Err(e) = registry.join_all().await {
                        tracing::warn!(error = %e, "Worker failed during shutdown");
                    }
                    return Err(ScrapeError::Interrupted);
                }
                _ = check.tick() => {}
            }

            if !self.board.has_pending_jobs() {
                break;
            }

            if let Some(&(role, worker)) = registry.check_dead_workers().first() {
                tracing::error!(%role, worker, counts = ?self.board.counts(), "Worker dead with jobs pending, aborting run");
                shutdown.cancel();
                registry.abort_all();
                return Err(ScrapeError::WorkerDead { role, worker });
            }
        }

        shutdown.cancel();
        registry.join_all().await?;

        let outcome = RunOutcome {
            ids_minted: self.board.minted(),
            elapsed: started.elapsed(),
        };
        tracing::info!(ids_minted = outcome.ids_minted, elapsed = ?outcome.elapsed, "Scrape finished");
        Ok(outcome)
    }

    fn spawn_workers(&self, shutdown: &CancellationToken) -> WorkerRegistry {
        let mut registry = WorkerRegistry::new();
        let interval = self.config.task_request_interval();

        for index in 0..self.config.fetch_workers.max(1) {
            let worker = FetchWorker::new(
                self.board.clone(),
                self.fetcher.clone(),
                self.storage.clone(),
                self.browser.clone(),
            );
            spawn_worker(&mut registry, worker, index, interval, shutdown);
        }

        for index in 0..self.config.cleaning_workers.max(1) {
            let worker = CleaningWorker::new(self.board.clone(), self.storage.clone());
            spawn_worker(&mut registry, worker, index, interval, shutdown);
        }

        registry
    }
}

fn spawn_worker<W>(
    registry: &mut WorkerRegistry,
    worker: W,
    index: usize,
    interval: Duration,
    shutdown: &CancellationToken,
) where
    W: DutyCycle + 'static,
    W::Task: 'static,
{
    let role = worker.role();
    let (status, status_rx) = StatusReporter::channel();
    let join = tokio::spawn(run_duty_cycle(
        worker,
        index,
        status,
        TaskRequestThrottle::new(interval),
        shutdown.clone(),
    ));
    registry.register(WorkerHandle::new(role, index, status_rx, join));
}
