pub mod capture;
pub mod cleaner;
pub mod cleaners;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod scheduler;
pub mod shutdown;
pub mod snapshot;
pub mod storage;
pub mod worker;

pub use cleaner::{Cleaner, CleanerOutput, Emit, FnCleaner, OutputFormat, OutputTarget, Record};
pub use config::ScraperConfig;
pub use driver::{RunOutcome, Scraper};
pub use error::{ProtocolError, Result, ScrapeError};
pub use scheduler::{JobBoard, JobId, NewJob};
pub use snapshot::Snapshot;
