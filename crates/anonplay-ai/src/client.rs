//! Structured completion contract.
//!
//! Every model interaction goes through [`CompletionClient`]: a system
//! instruction and user input in, text out. When a [`ResponseSchema`] is
//! attached the text is expected to be a JSON document conforming to it, but
//! conformance is checked by the caller when decoding, never here. Clients do
//! not retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::AiError;

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Named JSON schema constraining a completion's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub instruction: String,
    pub input: String,
    pub schema: Option<ResponseSchema>,
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    pub fn new(instruction: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            input: input.into(),
            schema: None,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.schema = Some(ResponseSchema {
            name: name.into(),
            schema,
        });
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.name.as_str())
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion and return the model's text output.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;
}

#[async_trait]
impl<C: CompletionClient + ?Sized> CompletionClient for Arc<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        (**self).complete(request).await
    }
}

/// Bounds every call of the wrapped client by a deadline.
///
/// A call that overruns is abandoned and reported as [`AiError::Timeout`].
pub struct TimeoutClient<C> {
    inner: C,
    limit: Duration,
}

impl<C> TimeoutClient<C> {
    pub fn new(inner: C, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for TimeoutClient<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        match tokio::time::timeout(self.limit, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    limit_ms = self.limit.as_millis() as u64,
                    schema = request.schema_name(),
                    "completion call timed out"
                );
                Err(AiError::Timeout(self.limit))
            }
        }
    }
}
