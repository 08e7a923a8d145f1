//! Bounded retry for read-modify-write cycles that hit version conflicts
//!
//! Only [`Error::Conflict`](crate::error::Error::Conflict) is retried. Every
//! other error is returned on the attempt that produced it.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::Result;

/// Configuration for conflict retries
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for the delay between attempts
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt
    pub backoff_multiplier: f64,
    /// Fraction of the delay added as random jitter
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::status_update()
    }
}

impl RetryConfig {
    /// Five quick attempts, matching the client-go default for status writes
    pub fn status_update() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            jitter: 0.1,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..self.jitter);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}

/// Run `operation` until it stops failing with a conflict or the budget is spent
///
/// The closure receives the 1-based attempt number and must re-read whatever
/// state it writes so that each attempt carries a fresh resourceVersion.
pub async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() && attempt < config.max_attempts => {
                let wait = config.jittered(delay);
                debug!(
                    operation = %operation_name,
                    attempt,
                    delay_ms = wait.as_millis() as u64,
                    "Version conflict, retrying"
                );
                tokio::time::sleep(wait).await;
                delay = config.next_delay(delay);
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!(
                        operation = %operation_name,
                        attempt,
                        "Giving up after repeated version conflicts"
                    );
                }
                return Err(e);
            }
        }
    }
}
