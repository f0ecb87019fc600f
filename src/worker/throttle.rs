use std::time::Duration;

use tokio::time::Instant;

/// Spaces out a worker's task requests so an idle worker does not spin
/// against the job board.
#[derive(Debug)]
pub struct TaskRequestThrottle {
    interval: Duration,
    last_request: Option<Instant>,
}

impl TaskRequestThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    /// Sleep until at least `interval` has passed since the previous
    /// request, then record this one. The first call returns immediately.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
