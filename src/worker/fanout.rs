use std::collections::HashMap;

use crate::cleaner::{Cleaner, CleanerOutput, Emit, Record, RecordKind};
use crate::error::Result;
use crate::scheduler::job::{JobId, NewJob};
use crate::scheduler::JobBoard;
use crate::storage::Persistence;

/// Where jobs emitted during cleaning are sent.
pub trait JobSink: Send + Sync {
    fn post(&self, job: NewJob) -> JobId;
}

impl JobSink for JobBoard {
    fn post(&self, job: NewJob) -> JobId {
        JobBoard::post(self, job)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub jobs_posted: usize,
    pub records: usize,
    pub batches: usize,
}

/// Consume one cleaning invocation's output.
///
/// Emitted jobs are posted as soon as they are seen so they can start
/// fetching while the rest of the output is consumed. Records are grouped
/// by concrete type, keeping emission order within a type, and each group
/// is saved as one batch after the output is exhausted, routed by the
/// cleaner's declared output and format.
pub fn fan_out(
    output: CleanerOutput,
    cleaner: &dyn Cleaner,
    jobs: &dyn JobSink,
    storage: &dyn Persistence,
) -> Result<FanOutSummary> {
    let mut summary = FanOutSummary::default();
    let mut groups: Vec<Vec<Record>> = Vec::new();
    let mut group_index: HashMap<RecordKind, usize> = HashMap::new();

    for item in output {
        match item? {
            Emit::Job(job) => {
                let id = jobs.post(job);
                tracing::debug!(job_id = %id, cleaner = %cleaner.name(), "Cleaner emitted job");
                summary.jobs_posted += 1;
            }
            Emit::Record(record) => {
                let slot = *group_index.entry(record.kind()).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[slot].push(record);
                summary.records += 1;
            }
        }
    }

    let target = cleaner.output();
    let format = cleaner.format();
    for batch in groups.iter().filter(|batch| !batch.is_empty()) {
        storage.save_records(batch, target.as_ref(), format)?;
        summary.batches += 1;
    }

    Ok(summary)
}
