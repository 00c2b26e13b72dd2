//! Bounded exponential-backoff retry as a small explicit state machine.
//!
//! The sleep is injected so the schedule can be checked without waiting.

use std::future::Future;
use std::time::Duration;

use metaso_core::{Error, Result};

#[async_trait::async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait::async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

#[derive(Debug)]
pub enum Decision {
    Retry { delay: Duration, error: Error },
    GiveUp(Error),
}

#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Start the next attempt and return its 1-based number.
    pub fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn on_failure(&self, error: Error) -> Decision {
        if !error.retryable() || self.attempt >= self.policy.max_attempts {
            return Decision::GiveUp(error);
        }
        Decision::Retry {
            delay: self.policy.delay_after(self.attempt),
            error,
        }
    }
}

/// Drive `op` until it succeeds, fails with a final error, or runs out of attempts.
/// The error of the last attempt is returned unchanged.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleep,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::new(*policy);
    loop {
        let attempt = state.begin();
        let error = match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match state.on_failure(error) {
            Decision::Retry { delay, error } => {
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = error.code(),
                    error = %error,
                    "attempt failed, retrying"
                );
                sleeper.sleep(delay).await;
            }
            Decision::GiveUp(error) => return Err(error),
        }
    }
}
