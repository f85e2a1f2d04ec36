//! Bounded retries.
//!
//! [`RetryPolicy::run`] wraps a fallible async operation; [`Attempts`] is the
//! same budget for loops that must mutate state between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::AiError;

/// Errors that may short-circuit a retry loop.
pub trait Retryable {
    fn is_fatal(&self) -> bool {
        false
    }
}

impl Retryable for AiError {
    fn is_fatal(&self) -> bool {
        AiError::is_fatal(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn budget(&self) -> Attempts {
        Attempts {
            used: 0,
            max: self.max_attempts.max(1),
        }
    }

    /// Sleep for the configured backoff, if any.
    pub async fn pause(&self) {
        if !self.backoff.is_zero() {
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Run `op` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut budget = self.budget();
        loop {
            let attempt = budget.next_attempt().unwrap_or(budget.max);
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if budget.is_exhausted() => {
                    warn!(op = label, attempts = attempt, error = %e, "retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(op = label, attempt, max = budget.max, error = %e, "attempt failed, retrying");
                    self.pause().await;
                }
            }
        }
    }
}

/// A consumable attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempts {
    used: u32,
    max: u32,
}

impl Attempts {
    /// Claim the next attempt, returning its 1-based number, or `None` when
    /// the budget is spent.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.used >= self.max {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }

    /// Start over with the full budget.
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Flaky(bool);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(fatal={})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_fatal(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn budget_counts_down() {
        let mut budget = RetryPolicy::new(2).budget();
        assert_eq!(budget.next_attempt(), Some(1));
        assert_eq!(budget.next_attempt(), Some(2));
        assert_eq!(budget.next_attempt(), None);
        assert!(budget.is_exhausted());
        budget.reset();
        assert_eq!(budget.next_attempt(), Some(1));
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        let mut budget = RetryPolicy::new(0).budget();
        assert_eq!(budget.next_attempt(), Some(1));
        assert_eq!(budget.next_attempt(), None);
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, Flaky> = RetryPolicy::new(3)
            .run("test", |attempt| {
                calls.set(calls.get() + 1);
                async move { if attempt < 3 { Err(Flaky(false)) } else { Ok(attempt) } }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), Flaky> = RetryPolicy::new(3)
            .run("test", |_| {
                calls.set(calls.get() + 1);
                async { Err(Flaky(false)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), Flaky> = RetryPolicy::new(5)
            .run("test", |_| {
                calls.set(calls.get() + 1);
                async { Err(Flaky(true)) }
            })
            .await;
        assert!(result.unwrap_err().0);
        assert_eq!(calls.get(), 1);
    }
}
