//! Job lifecycle state: the job board, the data it hands out and absorbs,
//! and liveness tracking for the workers that talk to it.

pub mod board;
pub mod event;
pub mod job;
pub mod liveness;
pub mod task;

use std::fmt;

pub use board::{BoardCounts, JobBoard};
pub use event::Event;
pub use job::{Job, JobId, NewJob};
pub use task::{CleanTask, FetchTask};

/// The four disjoint collections a job can occupy on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    WebPending,
    CleaningPending,
    Downloading,
    Parsing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::WebPending => write!(f, "web pending"),
            Stage::CleaningPending => write!(f, "cleaning pending"),
            Stage::Downloading => write!(f, "downloading"),
            Stage::Parsing => write!(f, "parsing"),
        }
    }
}
