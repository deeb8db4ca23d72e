// src/infosfera/throttle.rs
use std::time::Duration;

/// Fixed-window request throttle: after every `batch_size` requests the whole
/// process pauses for `pause`. No token bucket, no adaptive backoff.
#[derive(Debug, Clone)]
pub struct Throttle {
    batch_size: usize,
    pause: Duration,
    issued: usize,
}

impl Throttle {
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
            issued: 0,
        }
    }

    /// Records one request and returns the pause owed once a batch completes.
    pub fn register(&mut self) -> Option<Duration> {
        self.issued += 1;
        if self.issued % self.batch_size == 0 && !self.pause.is_zero() {
            Some(self.pause)
        } else {
            None
        }
    }

    /// Records one request and sleeps if it completed a batch.
    pub async fn tick(&mut self) {
        if let Some(pause) = self.register() {
            tracing::debug!("Issued {} requests, pausing for {:?}", self.issued, pause);
            tokio::time::sleep(pause).await;
        }
    }
}
