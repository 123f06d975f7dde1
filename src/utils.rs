use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::config::RetryConfig;

/// Run `operation` until it succeeds or `max_attempts` is reached, sleeping
/// an exponentially growing, jittered delay between attempts.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        max_attempts = config.max_attempts,
                        "Retry succeeded"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_attempts {
                    warn!(
                        max_attempts = config.max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms,
                    "Retry attempt failed, backing off"
                );

                sleep(Duration::from_millis(jittered(delay_ms))).await;

                delay_ms = std::cmp::min(delay_ms * config.backoff_multiplier, config.max_delay_ms);
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based), capped at the configured
/// maximum and jittered by ±10% so a batch of failures does not re-arrive in
/// lockstep.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let mut delay_ms = config.initial_delay_ms;
    for _ in 1..attempt {
        delay_ms = std::cmp::min(
            delay_ms.saturating_mul(config.backoff_multiplier),
            config.max_delay_ms,
        );
    }
    Duration::from_millis(jittered(delay_ms))
}

/// Wall-clock moment of retry number `attempt`, for the status store's
/// `next_retry_at` column.
pub fn next_retry_at(config: &RetryConfig, attempt: u32) -> DateTime<Utc> {
    let delay = backoff_delay(config, attempt);
    Utc::now() + ChronoDuration::milliseconds(delay.as_millis() as i64)
}

fn jittered(delay_ms: u64) -> u64 {
    let jitter = rand::random_range(-0.1..=0.1);
    (delay_ms as f64 * (1.0 + jitter)) as u64
}
