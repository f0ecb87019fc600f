use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::{DriverScript, SharedDriverScript};
use crate::cleaner::SharedCleaner;

/// Board-assigned job identifier. Monotonic and never reused within a run;
/// snapshot cleaning units draw from the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job as submitted by the driver or emitted by a cleaner, before the
/// board has given it an id.
#[derive(Clone)]
pub struct NewJob {
    pub url: String,
    pub cleaner: SharedCleaner,
    pub driver_script: Option<SharedDriverScript>,
}

impl NewJob {
    pub fn new(url: impl Into<String>, cleaner: SharedCleaner) -> Self {
        Self {
            url: url.into(),
            cleaner,
            driver_script: None,
        }
    }

    /// Turn this into a multi-shot capture job driven by `script`.
    pub fn with_driver_script(mut self, script: impl DriverScript + 'static) -> Self {
        self.driver_script = Some(Arc::new(script));
        self
    }

    /// One job per URL, all sharing `cleaner`.
    pub fn many<I, S>(cleaner: SharedCleaner, urls: I) -> Vec<NewJob>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .map(|url| NewJob::new(url, cleaner.clone()))
            .collect()
    }

    pub fn is_capture(&self) -> bool {
        self.driver_script.is_some()
    }
}

impl fmt::Debug for NewJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewJob")
            .field("url", &self.url)
            .field("cleaner", &self.cleaner.name())
            .field("capture", &self.is_capture())
            .finish()
    }
}

/// A job tracked by the board.
#[derive(Clone)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub cleaner: SharedCleaner,
    pub driver_script: Option<SharedDriverScript>,
    /// Storage handle of the fetched content; set on fetch completion.
    pub path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn from_new(id: JobId, new: NewJob) -> Self {
        Self {
            id,
            url: new.url,
            cleaner: new.cleaner,
            driver_script: new.driver_script,
            path: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_capture(&self) -> bool {
        self.driver_script.is_some()
    }

    /// Time since the job was posted.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("cleaner", &self.cleaner.name())
            .field("capture", &self.is_capture())
            .field("path", &self.path)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScraperJob(url={}, cleaner={})", self.url, self.cleaner.name())
    }
}
