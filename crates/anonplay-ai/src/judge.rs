//! LLM-as-judge utility scoring of an adapted text against its original.

use std::sync::Arc;

use anonplay_core::UtilityAssessment;
use tracing::debug;

use crate::client::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::schema::{UTILITY_SCHEMA_NAME, utility_schema};
use crate::{AiError, CompletionClient, CompletionRequest};

const JUDGE_INSTRUCTION: &str = "\
You are an expert text similarity scorer that carefully compares two texts and gives a score based \
on how similar they are. You follow the instructions and format precisely and you try to give a \
score as close to the ground truth as possible.";

fn build_prompt(adapted: &str, original: &str) -> String {
    format!(
        "You are a judge that must decide on a scale from 1-10 whether two sets of texts, the original \
         and the adapted, have the same meaning and content. 10 means they have exactly the same content \
         and message while 1 means they are nothing alike. Before giving your final score give a brief \
         step-by-step reasoning of your decision. Give your answer in the JSON format.\n\
         \n\
         original_text: {original}\n\
         \n\
         adapted_text: {adapted}"
    )
}

pub struct UtilityJudge {
    client: Arc<dyn CompletionClient>,
    max_output_tokens: u32,
}

impl UtilityJudge {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Judge readability, meaning preservation and hallucination of
    /// `adapted` relative to `original`.
    ///
    /// Scores are returned as the model gave them, even when outside the
    /// ranges the schema describes.
    pub async fn judge_utility(
        &self,
        adapted: &str,
        original: &str,
    ) -> Result<UtilityAssessment, AiError> {
        if adapted.is_empty() {
            return Err(AiError::Input("adapted text"));
        }
        if original.is_empty() {
            return Err(AiError::Input("original text"));
        }

        let request = CompletionRequest::new(JUDGE_INSTRUCTION, build_prompt(adapted, original))
            .with_schema(UTILITY_SCHEMA_NAME, utility_schema())
            .with_max_output_tokens(self.max_output_tokens);

        debug!(chars = adapted.len(), "judging utility");
        let raw = self.client.complete(&request).await?;
        serde_json::from_str(&raw).map_err(|e| AiError::decode("utility assessment", e))
    }
}
