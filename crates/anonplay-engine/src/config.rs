use std::fmt;
use std::time::Duration;

use anonplay_ai::RetryPolicy;
use anonplay_ai::client::DEFAULT_MAX_OUTPUT_TOKENS;
use anonplay_ai::rewriter::REWRITE_ATTEMPTS;

pub const DEFAULT_ROUNDS: usize = 1;
pub const DEFAULT_STEP_RETRIES: u32 = 3;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a run needs, passed explicitly to the batch entry point.
#[derive(Clone)]
pub struct RunConfig {
    /// Provider credential. A run without one is refused.
    pub credential: Option<String>,
    /// Provider model override; the provider default when `None`.
    pub model: Option<String>,
    /// Provider endpoint override.
    pub base_url: Option<String>,
    /// Number of rewrite rounds per item.
    pub round: usize,
    /// Re-evaluations of a version after its first attempt.
    pub step_retries: u32,
    /// Attempts per rewrite.
    pub rewrite_attempts: u32,
    /// Pause between retries of a step or rewrite.
    pub backoff: Duration,
    /// Deadline for a single completion call.
    pub call_timeout: Duration,
    pub max_output_tokens: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            credential: None,
            model: None,
            base_url: None,
            round: DEFAULT_ROUNDS,
            step_retries: DEFAULT_STEP_RETRIES,
            rewrite_attempts: REWRITE_ATTEMPTS,
            backoff: Duration::ZERO,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl RunConfig {
    /// The credential, if set and non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref().filter(|c| !c.is_empty())
    }

    /// Evaluation passes per version: the first plus `step_retries`.
    pub fn step_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.step_retries.saturating_add(1)).with_backoff(self.backoff)
    }

    pub fn rewrite_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.rewrite_attempts).with_backoff(self.backoff)
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("round", &self.round)
            .field("step_retries", &self.step_retries)
            .field("rewrite_attempts", &self.rewrite_attempts)
            .field("backoff", &self.backoff)
            .field("call_timeout", &self.call_timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}
