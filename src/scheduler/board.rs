use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cleaner::SharedCleaner;
use crate::error::ProtocolError;
use crate::scheduler::event::Event;
use crate::scheduler::job::{Job, JobId, NewJob};
use crate::scheduler::task::{
    CleanTask, CleaningTask, FetchTask, SnapshotCaptureTask, SnapshotCleaningTask, WebTask,
};
use crate::scheduler::Stage;

/// Something waiting for, or undergoing, cleaning.
enum CleaningUnit {
    /// A fetched job, cleaned from the single stored page.
    Fetched { job: Job, path: PathBuf },
    /// One capture of a multi-shot job. Carries its own id so each capture
    /// is tracked independently of the originating job.
    Snapshot {
        id: JobId,
        origin: JobId,
        cleaner: SharedCleaner,
        paths: BTreeMap<String, PathBuf>,
    },
}

impl CleaningUnit {
    fn id(&self) -> JobId {
        match self {
            CleaningUnit::Fetched { job, .. } => job.id,
            CleaningUnit::Snapshot { id, .. } => *id,
        }
    }

    fn task(&self) -> CleanTask {
        match self {
            CleaningUnit::Fetched { job, path } => CleanTask::Cleaning(CleaningTask {
                path: path.clone(),
                cleaner: job.cleaner.clone(),
                job_id: job.id,
            }),
            CleaningUnit::Snapshot {
                id, cleaner, paths, ..
            } => CleanTask::SnapshotCleaning(SnapshotCleaningTask {
                paths: paths.clone(),
                cleaner: cleaner.clone(),
                job_id: *id,
            }),
        }
    }
}

#[derive(Default)]
struct BoardState {
    web_pending: VecDeque<Job>,
    cleaning_pending: VecDeque<CleaningUnit>,
    downloading: HashMap<JobId, Job>,
    parsing: HashMap<JobId, CleaningUnit>,
}

impl BoardState {
    /// The downloading job `job_id`, provided its capture mode matches the
    /// event being reported.
    fn expect_downloading(
        &self,
        job_id: JobId,
        capture: bool,
        event: &'static str,
    ) -> Result<&Job, ProtocolError> {
        let job = self.downloading.get(&job_id).ok_or(ProtocolError::UnknownJob {
            job_id,
            stage: Stage::Downloading,
        })?;
        if job.is_capture() != capture {
            tracing::error!(job_id = %job_id, event, capture = job.is_capture(), "Event does not match job kind");
            return Err(ProtocolError::WrongTaskKind { job_id, event });
        }
        Ok(job)
    }

    fn len(&self) -> usize {
        self.web_pending.len() + self.cleaning_pending.len() + self.downloading.len() + self.parsing.len()
    }
}

/// Number of entries in each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCounts {
    pub web_pending: usize,
    pub cleaning_pending: usize,
    pub downloading: usize,
    pub parsing: usize,
}

impl BoardCounts {
    pub fn total(&self) -> usize {
        self.web_pending + self.cleaning_pending + self.downloading + self.parsing
    }
}

/// Coordinator owning the stage of every job in a run.
///
/// Jobs move through four disjoint collections:
///
/// ```text
/// post -> web_pending -> downloading -> cleaning_pending -> parsing -> (retired)
/// ```
///
/// Dequeueing moves an entry into the matching in-flight map, so a job is
/// held in exactly one place at any instant. All mutations are serialised
/// by one mutex and never block on I/O; [`JobBoard::has_pending_jobs`] is a
/// lock-free read.
pub struct JobBoard {
    state: Mutex<BoardState>,
    next_id: AtomicU64,
    occupied: AtomicUsize,
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl JobBoard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BoardState::default()),
            next_id: AtomicU64::new(0),
            occupied: AtomicUsize::new(0),
        }
    }

    // Every operation leaves the state consistent before returning, so a
    // poisoned lock still guards valid data.
    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mint_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn publish(&self, state: &BoardState) {
        self.occupied.store(state.len(), Ordering::Release);
    }

    /// Enqueue a job at the tail of the fetch queue and return its id.
    pub fn post(&self, new: NewJob) -> JobId {
        let id = self.mint_id();
        let job = Job::from_new(id, new);
        tracing::debug!(job_id = %id, url = %job.url, capture = job.is_capture(), "Job posted");

        let mut state = self.state();
        state.web_pending.push_back(job);
        self.publish(&state);
        id
    }

    /// Pop the oldest job awaiting fetch, marking it as downloading.
    ///
    /// Returns `None` when nothing is queued; callers are expected to poll.
    pub fn get_web_task(&self) -> Option<FetchTask> {
        let mut state = self.state();
        let job = state.web_pending.pop_front()?;

        let task = match &job.driver_script {
            Some(script) => FetchTask::SnapshotCapture(SnapshotCaptureTask {
                url: job.url.clone(),
                driver_script: script.clone(),
                job_id: job.id,
            }),
            None => FetchTask::Web(WebTask {
                url: job.url.clone(),
                job_id: job.id,
            }),
        };

        tracing::debug!(job_id = %task.job_id(), url = task.url(), capture = job.is_capture(), "Fetch task dispatched");
        state.downloading.insert(job.id, job);
        self.publish(&state);
        Some(task)
    }

    /// Pop the oldest unit awaiting cleaning, marking it as parsing.
    pub fn get_cleaning_task(&self) -> Option<CleanTask> {
        let mut state = self.state();
        let unit = state.cleaning_pending.pop_front()?;
        let task = unit.task();

        tracing::debug!(job_id = %unit.id(), "Cleaning task dispatched");
        state.parsing.insert(unit.id(), unit);
        self.publish(&state);
        Some(task)
    }

    /// Advance state for a completion event.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for an unrecognized event, when the
    /// event names a job that is not in the expected in-flight stage, or
    /// when a fetch event is reported for a capture job (or the reverse).
    /// The board is left unchanged in every case.
    pub fn report_event(&self, event: Event) -> Result<(), ProtocolError> {
        let kind = event.kind();
        let mut state = self.state();

        match event {
            Event::WebTaskComplete { path, job_id } => {
                state.expect_downloading(job_id, false, kind)?;
                let mut job = state
                    .downloading
                    .remove(&job_id)
                    .ok_or(ProtocolError::UnknownJob {
                        job_id,
                        stage: Stage::Downloading,
                    })?;
                job.path = Some(path.clone());
                tracing::debug!(job_id = %job_id, path = %path.display(), "Fetch complete");
                state.cleaning_pending.push_back(CleaningUnit::Fetched { job, path });
            }
            Event::SnapshotCaptured { paths, job_id } => {
                let cleaner = state.expect_downloading(job_id, true, kind)?.cleaner.clone();
                let id = self.mint_id();
                tracing::debug!(job_id = %job_id, unit_id = %id, shots = paths.len(), "Snapshot captured");
                state.cleaning_pending.push_back(CleaningUnit::Snapshot {
                    id,
                    origin: job_id,
                    cleaner,
                    paths,
                });
            }
            Event::SnapshotCaptureComplete { job_id } => {
                state.expect_downloading(job_id, true, kind)?;
                if let Some(job) = state.downloading.remove(&job_id) {
                    tracing::debug!(job_id = %job_id, age_ms = job.age().num_milliseconds(), "Snapshot capture complete");
                }
            }
            Event::CleaningTaskComplete { job_id } => {
                let unit = state
                    .parsing
                    .remove(&job_id)
                    .ok_or(ProtocolError::UnknownJob {
                        job_id,
                        stage: Stage::Parsing,
                    })?;
                match unit {
                    CleaningUnit::Snapshot { origin, .. } => {
                        tracing::debug!(job_id = %job_id, origin = %origin, "Snapshot cleaning complete");
                    }
                    CleaningUnit::Fetched { job, .. } => {
                        tracing::debug!(job_id = %job_id, age_ms = job.age().num_milliseconds(), "Job retired");
                    }
                }
            }
            Event::Unrecognized => {
                tracing::error!(kind, "Unrecognized event reported to job board");
                return Err(ProtocolError::UnrecognizedEvent);
            }
        }

        self.publish(&state);
        Ok(())
    }

    /// True while any job or cleaning unit is queued or in flight.
    pub fn has_pending_jobs(&self) -> bool {
        self.occupied.load(Ordering::Acquire) != 0
    }

    /// Number of ids handed out so far.
    pub fn minted(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    pub fn counts(&self) -> BoardCounts {
        let state = self.state();
        BoardCounts {
            web_pending: state.web_pending.len(),
            cleaning_pending: state.cleaning_pending.len(),
            downloading: state.downloading.len(),
            parsing: state.parsing.len(),
        }
    }

    /// Every stage currently holding `id`. More than one entry means the
    /// exactly-one-slot invariant has been broken.
    pub fn locate(&self, id: JobId) -> Vec<Stage> {
        let state = self.state();
        let mut stages = Vec::new();
        if state.web_pending.iter().any(|j| j.id == id) {
            stages.push(Stage::WebPending);
        }
        if state.cleaning_pending.iter().any(|u| u.id() == id) {
            stages.push(Stage::CleaningPending);
        }
        if state.downloading.contains_key(&id) {
            stages.push(Stage::Downloading);
        }
        if state.parsing.contains_key(&id) {
            stages.push(Stage::Parsing);
        }
        stages
    }
}
