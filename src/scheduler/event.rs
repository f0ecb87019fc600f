use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scheduler::job::JobId;

/// Completion signal sent from a worker to the job board.
///
/// Events are plain data so a worker substrate can carry them over any
/// transport; they encode as JSON tagged by `kind`. A kind this board does
/// not know decodes as [`Event::Unrecognized`] and is rejected by
/// `JobBoard::report_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    WebTaskComplete {
        path: PathBuf,
        job_id: JobId,
    },
    /// One shot of a multi-shot capture; fires once per snapshot.
    SnapshotCaptured {
        paths: BTreeMap<String, PathBuf>,
        job_id: JobId,
    },
    SnapshotCaptureComplete {
        job_id: JobId,
    },
    CleaningTaskComplete {
        job_id: JobId,
    },
    #[serde(other)]
    Unrecognized,
}

impl Event {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Event::WebTaskComplete { job_id, .. }
            | Event::SnapshotCaptured { job_id, .. }
            | Event::SnapshotCaptureComplete { job_id }
            | Event::CleaningTaskComplete { job_id } => Some(*job_id),
            Event::Unrecognized => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::WebTaskComplete { .. } => "web_task_complete",
            Event::SnapshotCaptured { .. } => "snapshot_captured",
            Event::SnapshotCaptureComplete { .. } => "snapshot_capture_complete",
            Event::CleaningTaskComplete { .. } => "cleaning_task_complete",
            Event::Unrecognized => "unrecognized",
        }
    }
}
