//! Retry on optimistic concurrency conflicts

use std::future::Future;
use std::time::Duration;

use crate::repository::StoreError;

/// Bounded backoff schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Total number of attempts, the first one included
    pub steps: u32,
    /// Delay before the second attempt
    pub duration: Duration,
    /// Multiplier applied to the delay after each retry
    pub factor: f64,
    /// Upper bound on any single delay
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            steps: 5,
            duration: Duration::from_millis(10),
            factor: 1.0,
            cap: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Delay to wait after the failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.duration.as_secs_f64() * self.factor.powi(exponent);
        if delay.is_finite() {
            Duration::from_secs_f64(delay).min(self.cap)
        } else {
            self.cap
        }
    }
}

/// Runs a read-modify-write operation, retrying it while it conflicts
///
/// `op` must re-read the object on every call. Only
/// [`StoreError::Conflict`] is retried; any other error is returned at once.
/// When every attempt conflicts, the last conflict is returned.
pub async fn retry_on_conflict<T, F, Fut>(backoff: &Backoff, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let steps = backoff.steps.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op().await {
            Err(e) if e.is_conflict() && attempt < steps => {
                let delay = backoff.delay(attempt);
                tracing::debug!(
                    "Conflict on attempt {}/{}, retrying in {:?}: {}",
                    attempt,
                    steps,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
