//! Exponential backoff with jitter around strategy attempts.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::strategies::StrategyOutcome;

/// Retry wrapper for operations that can fail transiently.
///
/// Only `Transient` outcomes consume the budget; `Success`, `NotApplicable`
/// and `Fatal` pass through on the attempt that produced them. Exhausting
/// the budget converts the last transient failure into a fatal one carrying
/// the attempt count.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// A budget below one attempt makes no sense and is clamped.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<F, Fut>(&self, mut operation: F) -> StrategyOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StrategyOutcome>,
    {
        let mut last_reason = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(attempt);
                tracing::debug!(
                    attempt,
                    max_attempts = self.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    "retrying after transient failure: {last_reason}"
                );
                tokio::time::sleep(delay).await;
            }
            match operation().await {
                StrategyOutcome::Transient(reason) => last_reason = reason,
                outcome => return outcome,
            }
        }
        StrategyOutcome::Fatal(format!(
            "still failing after {} attempts: {last_reason}",
            self.max_attempts
        ))
    }
}

/// Wait before attempt `k` (counting from 1): `2^(k-2)` seconds plus up to
/// one second of jitter. The first retry waits 1-2s and doubles from there.
fn backoff_delay(attempt: u32) -> Duration {
    let base = 2f64.powi(attempt as i32 - 2);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(base + jitter)
}
