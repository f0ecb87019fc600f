use std::path::PathBuf;

use thiserror::Error;

use crate::scheduler::job::JobId;
use crate::scheduler::liveness::WorkerRole;
use crate::scheduler::Stage;

/// Desynchronisation between a worker and the job board.
///
/// Once one of these is raised the board invariants can no longer be
/// trusted and the run must be aborted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unrecognized event reported to the job board")]
    UnrecognizedEvent,

    #[error("Job {job_id} is not {stage}")]
    UnknownJob { job_id: JobId, stage: Stage },

    #[error("Job {job_id} cannot accept a {event} event")]
    WrongTaskKind { job_id: JobId, event: &'static str },
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser capture failed: {0}")]
    Capture(String),

    #[error("No browser launcher configured for snapshot capture of {0}")]
    NoBrowser(String),

    #[error("Cleaner failed: {0}")]
    Cleaner(String),

    #[error("{cleaner} does not support snapshot cleaning")]
    SnapshotUnsupported { cleaner: String },

    #[error("{label:?} not present in snapshot, valid labels = {valid:?}")]
    MissingSnapshotField { label: String, valid: Vec<String> },

    #[error("{role} worker {worker} died while jobs were pending")]
    WorkerDead { role: WorkerRole, worker: usize },

    #[error("Run interrupted by shutdown signal")]
    Interrupted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that indicate a broken worker/board protocol.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl From<tokio::task::JoinError> for ScrapeError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
