use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP client settings for the fetch collaborator.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout. Exceeding it fails the task and so kills the
    /// fetch worker.
    pub timeout_ms: u64,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: concat!("scrape-lite/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Root for persisted records; raw content lives under `.raw/`.
    pub data_dir: PathBuf,
    /// Minimum gap between two task requests from the same worker.
    pub task_request_interval_ms: u64,
    /// How often the driver checks for drained work and dead workers.
    pub liveness_check_interval_ms: u64,
    pub fetch_workers: usize,
    pub cleaning_workers: usize,
    pub fetch: FetchConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            task_request_interval_ms: 100,
            liveness_check_interval_ms: 50,
            fetch_workers: 1,
            cleaning_workers: 1,
            fetch: FetchConfig::default(),
        }
    }
}

impl ScraperConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        raw_dir(&self.data_dir)
    }

    pub fn with_workers(mut self, fetch: usize, cleaning: usize) -> Self {
        self.fetch_workers = fetch.max(1);
        self.cleaning_workers = cleaning.max(1);
        self
    }

    pub fn with_task_request_interval(mut self, interval_ms: u64) -> Self {
        self.task_request_interval_ms = interval_ms;
        self
    }

    pub fn with_liveness_check_interval(mut self, interval_ms: u64) -> Self {
        self.liveness_check_interval_ms = interval_ms;
        self
    }

    pub fn task_request_interval(&self) -> Duration {
        Duration::from_millis(self.task_request_interval_ms)
    }

    pub fn liveness_check_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_check_interval_ms)
    }
}

pub(crate) fn raw_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(".raw")
}
