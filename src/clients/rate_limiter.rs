use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Single-flight cooperative throttle over outbound platform calls.
///
/// The lock is held across the spacing sleep, so at most one caller is ever
/// counting down toward the next permitted call; everyone else queues on the
/// mutex. Not a token bucket: there is no bursting beyond one in-flight
/// request, which is exactly the platform's documented per-app ceiling.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Block until the minimum spacing from the last permitted call has
    /// elapsed, or return `ShuttingDown` if the token is cancelled first.
    pub async fn wait(&self, shutdown: &CancellationToken) -> Result<(), WorkerError> {
        let mut last_call = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(WorkerError::ShuttingDown),
            guard = self.last_call.lock() => guard,
        };

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Err(WorkerError::ShuttingDown),
                    _ = sleep(self.min_interval - elapsed) => {}
                }
            }
        }

        *last_call = Some(Instant::now());
        Ok(())
    }
}
