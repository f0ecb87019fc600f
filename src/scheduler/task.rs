//! Worker-directed instructions derived from a job's current stage.
//!
//! Tasks are created on dequeue and never stored by the board; they carry
//! only what the worker needs plus the `job_id` used to report back.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::capture::SharedDriverScript;
use crate::cleaner::SharedCleaner;
use crate::scheduler::job::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebTask {
    pub url: String,
    pub job_id: JobId,
}

#[derive(Clone)]
pub struct SnapshotCaptureTask {
    pub url: String,
    pub driver_script: SharedDriverScript,
    pub job_id: JobId,
}

#[derive(Clone)]
pub struct CleaningTask {
    pub path: PathBuf,
    pub cleaner: SharedCleaner,
    pub job_id: JobId,
}

#[derive(Clone)]
pub struct SnapshotCleaningTask {
    pub paths: BTreeMap<String, PathBuf>,
    pub cleaner: SharedCleaner,
    pub job_id: JobId,
}

/// Work for the fetch role.
#[derive(Debug, Clone)]
pub enum FetchTask {
    Web(WebTask),
    SnapshotCapture(SnapshotCaptureTask),
}

impl FetchTask {
    pub fn job_id(&self) -> JobId {
        match self {
            FetchTask::Web(t) => t.job_id,
            FetchTask::SnapshotCapture(t) => t.job_id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchTask::Web(t) => &t.url,
            FetchTask::SnapshotCapture(t) => &t.url,
        }
    }
}

/// Work for the cleaning role.
#[derive(Debug, Clone)]
pub enum CleanTask {
    Cleaning(CleaningTask),
    SnapshotCleaning(SnapshotCleaningTask),
}

impl CleanTask {
    pub fn job_id(&self) -> JobId {
        match self {
            CleanTask::Cleaning(t) => t.job_id,
            CleanTask::SnapshotCleaning(t) => t.job_id,
        }
    }

    pub fn cleaner(&self) -> &SharedCleaner {
        match self {
            CleanTask::Cleaning(t) => &t.cleaner,
            CleanTask::SnapshotCleaning(t) => &t.cleaner,
        }
    }
}

impl fmt::Debug for SnapshotCaptureTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCaptureTask")
            .field("url", &self.url)
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for CleaningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleaningTask")
            .field("path", &self.path)
            .field("cleaner", &self.cleaner.name())
            .field("job_id", &self.job_id)
            .finish()
    }
}

impl fmt::Debug for SnapshotCleaningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCleaningTask")
            .field("paths", &self.paths)
            .field("cleaner", &self.cleaner.name())
            .field("job_id", &self.job_id)
            .finish()
    }
}
