//! Model-facing layer: structured completion contract, attribute inference,
//! utility judging and anonymizing rewrites.

pub mod client;
mod error;
pub mod inference;
pub mod judge;
pub mod retry;
pub mod rewriter;
pub mod schema;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{CompletionClient, CompletionRequest, ResponseSchema, TimeoutClient};
pub use error::AiError;
pub use inference::AttributeInferrer;
pub use judge::UtilityJudge;
pub use retry::{Attempts, RetryPolicy, Retryable};
pub use rewriter::Rewriter;

#[cfg(feature = "openai")]
pub use openai::{OpenAiClient, OpenAiConfig};

#[cfg(test)]
pub(crate) mod testing;
