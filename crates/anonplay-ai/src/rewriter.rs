//! Minimal-edit anonymizing rewrites.
//!
//! The model explains its planned edits, writes a line holding only `#`, then
//! the rewritten text. Everything after the last `#` up to the next newline
//! is taken as the rewrite.

use std::sync::Arc;

use anonplay_core::PrivacyAssessment;
use tracing::{debug, warn};

use crate::client::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::{AiError, CompletionClient, CompletionRequest, RetryPolicy};

/// Attempts per rewrite before giving up.
pub const REWRITE_ATTEMPTS: u32 = 3;

const ANONYMIZER_INSTRUCTION: &str = "\
You are an expert anonymizer that carefully adapts small parts of the text to make it anonymous. \
You follow the instructions and format precisely and you try to change as little as possible, \
keeping the original text intact as much as possible. Only generalize information and do not \
invent new information.
Example: 'my husband and I' -> 'my partner and I' is valid, but 'my husband and I' -> 'my wife and I' is not.
Example: 'my husband and I have a dog' -> 'my partner and I have a dog' is valid, but \
'my husband and I have a dog' -> 'my partner and I have a cat' is not.
Example: 'my husband and I' -> 'I' is also valid as it only removes information.";

fn build_prompt(text: &str, assessment: &PrivacyAssessment) -> String {
    let inferences = assessment
        .confident()
        .map(|(attribute, inf)| {
            let guess = inf.top_guess().map(ToString::to_string).unwrap_or_default();
            format!(
                "Type: {attribute}\nInference: {}\nGuess: {guess}",
                inf.inference
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Below I give you a comment from a user as well as personal inferences made about the user \
         that can be made from the comment. Your task is to anonymize the comment to prevent these \
         inferences, while keeping the rest of the text intact.\n\
         \n\
         Comment:\n\
         {text}\n\
         \n\
         Inferences:\n\
         {inferences}\n\
         \n\
         In a first step briefly explain the changes you will make. In a new line write a single # \
         and then return the anonymized text. Only change relevant parts and keep everything else as \
         is. Make sure you keep the original meaning, i.e. do not invent new information instead \
         generalize information."
    )
}

/// Extract the rewrite from a delimiter-marked response.
pub fn parse_rewrite(response: &str) -> Result<String, AiError> {
    let start = response.rfind('#').ok_or(AiError::Format)?;
    let chunk = response[start + 1..]
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim();
    if chunk.is_empty() {
        return Err(AiError::EmptyResult);
    }
    Ok(chunk.to_string())
}

pub struct Rewriter {
    client: Arc<dyn CompletionClient>,
    retry: RetryPolicy,
    max_output_tokens: u32,
}

impl Rewriter {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::new(REWRITE_ATTEMPTS),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Rewrite `text` to defeat the confident inferences in `assessment`.
    ///
    /// Malformed or failed responses are retried per the retry policy. An
    /// empty string means every attempt failed.
    pub async fn anonymize(&self, text: &str, assessment: &PrivacyAssessment) -> String {
        let request = CompletionRequest::new(ANONYMIZER_INSTRUCTION, build_prompt(text, assessment))
            .with_max_output_tokens(self.max_output_tokens);

        debug!(
            targets = assessment.confident().count(),
            chars = text.len(),
            "requesting rewrite"
        );
        match self.retry.run("anonymize", |_| self.attempt(&request)).await {
            Ok(rewrite) => rewrite,
            Err(e) => {
                warn!(error = %e, attempts = self.retry.max_attempts, "rewrite failed, returning empty text");
                String::new()
            }
        }
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let response = self.client.complete(request).await?;
        parse_rewrite(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use anonplay_core::{AttributeInference, AttributeType};
    use std::collections::BTreeMap;

    fn assessment() -> PrivacyAssessment {
        let mut map = BTreeMap::new();
        map.insert(
            AttributeType::Location,
            AttributeInference {
                inference: "mentions Seoul".into(),
                value: vec!["Seoul".into(), "Busan".into()],
                confidence: 5,
                score: None,
            },
        );
        map.insert(
            AttributeType::Income,
            AttributeInference {
                inference: "no clue".into(),
                value: vec!["medium".into()],
                confidence: 1,
                score: None,
            },
        );
        PrivacyAssessment(map)
    }

    #[test]
    fn parses_after_last_delimiter() {
        let parsed = parse_rewrite("reasoning...\n#\n  Anonymized body.\nExtra").unwrap();
        assert_eq!(parsed, "Anonymized body.");
    }

    #[test]
    fn uses_last_hash_in_response() {
        let parsed = parse_rewrite("I will change #1 and #2\n#\nI live in Asia.").unwrap();
        assert_eq!(parsed, "I live in Asia.");
    }

    #[test]
    fn missing_delimiter_is_a_format_error() {
        assert!(matches!(parse_rewrite("no delimiter here"), Err(AiError::Format)));
    }

    #[test]
    fn blank_rewrite_is_empty_result() {
        assert!(matches!(parse_rewrite("reasoning\n#\n   \n"), Err(AiError::EmptyResult)));
    }

    #[test]
    fn prompt_lists_only_confident_inferences() {
        let prompt = build_prompt("I love Seoul.", &assessment());
        assert!(prompt.contains("Type: location\nInference: mentions Seoul\nGuess: Seoul"));
        assert!(!prompt.contains("income"));
        assert!(prompt.contains("Comment:\nI love Seoul."));
    }

    #[tokio::test]
    async fn retries_malformed_then_succeeds() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("forgot the delimiter".into()),
            Ok("Generalizing the city.\n#\nI love my city.".into()),
        ]));
        let rewriter = Rewriter::new(client.clone());

        let out = rewriter.anonymize("I love Seoul.", &assessment()).await;

        assert_eq!(out, "I love my city.");
        assert_eq!(client.calls(), 2);
        assert!(client.last_request().schema.is_none());
    }

    #[tokio::test]
    async fn gives_up_with_empty_string_after_three_failures() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("nope".into()),
            Ok("still nope".into()),
            Ok("never".into()),
            Ok("reason\n#\ntoo late".into()),
        ]));
        let rewriter = Rewriter::new(client.clone());

        let out = rewriter.anonymize("I love Seoul.", &assessment()).await;

        assert_eq!(out, "");
        assert_eq!(client.calls(), 3);
    }
}
