//! Bounded retry with exponential backoff for remote calls.

use crate::deadline::Deadline;
use shadowops_embeddings::EmbeddingError;
use shadowops_llm::LlmError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Errors a [`RetryPolicy`] knows how to classify.
pub trait Retriable: Sized {
    /// Whether the same call may succeed on another attempt.
    fn is_retriable(&self) -> bool;

    /// The error reported when a single attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl Retriable for EmbeddingError {
    fn is_retriable(&self) -> bool {
        EmbeddingError::is_retriable(self)
    }

    fn timed_out(after: Duration) -> Self {
        EmbeddingError::Timeout(after.as_secs())
    }
}

impl Retriable for LlmError {
    fn is_retriable(&self) -> bool {
        LlmError::is_retriable(self)
    }

    fn timed_out(after: Duration) -> Self {
        LlmError::Timeout(after.as_secs().min(u32::MAX as u64) as u32)
    }
}

/// Retry behaviour for one remote operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Ceiling for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before retry number `retry` (1-based): base × multiplier^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Longest time [`run`](Self::run) can take when every attempt times out.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempt_timeout * (self.max_retries + 1);
        (1..=self.max_retries).map(|r| self.delay_for(r)).sum::<Duration>() + attempts
    }

    /// Run `operation` until it succeeds, fails permanently, retries run
    /// out, or `budget` passes.
    ///
    /// Each attempt is bounded by `attempt_timeout` and by the time left in
    /// `budget`; an elapsed attempt counts as a retriable failure. No retry
    /// starts whose backoff would outlast the budget.
    pub async fn run<T, E, F, Fut>(&self, what: &str, budget: &Deadline, mut operation: F) -> Result<T, E>
    where
        E: Retriable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            let limit = self.attempt_timeout.min(budget.remaining());
            if limit.is_zero() {
                return Err(E::timed_out(limit));
            }
            let outcome = match tokio::time::timeout(limit, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(E::timed_out(limit)),
            };

            match outcome {
                Ok(value) => {
                    if retry > 0 {
                        debug!(operation = what, retries = retry, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retriable()
                    && retry < self.max_retries
                    && self.delay_for(retry + 1) < budget.remaining() =>
                {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        operation = what,
                        error = %e,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
