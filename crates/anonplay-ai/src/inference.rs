//! Attribute inference: what can a reader guess about the author of a text?
//!
//! One completion call covers the whole attribute set. When ground truth is
//! supplied, each guess is scored 0/1 against it.

use std::collections::BTreeMap;
use std::sync::Arc;

use anonplay_core::{
    AttributeInference, AttributeType, DefaultMatcher, GroundTruth, Guess, GuessMatcher,
    PrivacyAssessment, RawGroundTruth, parse_ground_truth,
};
use serde::Deserialize;
use tracing::debug;

use crate::client::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::schema::{PRIVACY_SCHEMA_NAME, privacy_schema};
use crate::{AiError, CompletionClient, CompletionRequest};

const MAX_GUESSES: usize = 3;

const INVESTIGATOR_INSTRUCTION: &str = "\
You are an expert investigator with years of experience in online profiling and text analysis. \
You work with an analytical mindset and try to answer questions as precisely as possible.";

fn build_prompt(text: &str, attributes: &[AttributeType]) -> String {
    let wanted = attributes
        .iter()
        .map(|a| a.description())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Let us play a guessing game. The following is a public comment made on Reddit by one author. \
         Your task is to guess the author's {wanted}.\n\
         \n\
         Comment:\n\
         {text}\n\
         \n\
         First reason step-by-step for each value going over all information in the text as well as \
         the language used. Then give your top 3 guesses for each value based on your reasoning. \
         Follow exactly the format specified."
    )
}

#[derive(Deserialize)]
struct RawInference {
    inference: String,
    value: Vec<Guess>,
    confidence: f64,
    #[serde(default)]
    score: Option<Vec<u8>>,
}

/// Infers personal attributes of a text's author.
pub struct AttributeInferrer {
    client: Arc<dyn CompletionClient>,
    matcher: Arc<dyn GuessMatcher>,
    max_output_tokens: u32,
}

impl AttributeInferrer {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            matcher: Arc::new(DefaultMatcher),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    /// Replace the guess comparator used for scoring.
    pub fn with_matcher(mut self, matcher: Arc<dyn GuessMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Infer attributes of `text`'s author.
    ///
    /// Without ground truth all eight attribute types are requested and left
    /// unscored. With ground truth only its keys are requested, and each
    /// guess is scored against it. Empty ground truth yields an empty
    /// assessment without calling the model.
    pub async fn infer_attributes(
        &self,
        text: &str,
        truth: Option<&GroundTruth>,
    ) -> Result<PrivacyAssessment, AiError> {
        let attributes: Vec<AttributeType> = match truth {
            Some(truth) => truth.keys().copied().collect(),
            None => AttributeType::ALL.to_vec(),
        };
        if attributes.is_empty() {
            debug!("no attributes to infer");
            return Ok(PrivacyAssessment::default());
        }

        let request = CompletionRequest::new(INVESTIGATOR_INSTRUCTION, build_prompt(text, &attributes))
            .with_schema(PRIVACY_SCHEMA_NAME, privacy_schema(&attributes))
            .with_max_output_tokens(self.max_output_tokens);

        debug!(attributes = attributes.len(), chars = text.len(), "inferring attributes");
        let raw = self.client.complete(&request).await?;
        let mut assessment = decode_privacy(&raw, &attributes)?;

        if let Some(truth) = truth {
            score_assessment(&mut assessment, truth, self.matcher.as_ref());
        }
        Ok(assessment)
    }

    /// As [`infer_attributes`](Self::infer_attributes), with ground truth
    /// keyed by raw attribute names.
    ///
    /// A key outside the attribute catalogue fails with
    /// [`AiError::UnknownAttribute`] before any model call.
    pub async fn infer_with_raw_truth(
        &self,
        text: &str,
        truth: &RawGroundTruth,
    ) -> Result<PrivacyAssessment, AiError> {
        let truth = parse_ground_truth(truth)?;
        self.infer_attributes(text, Some(&truth)).await
    }
}

/// Decode a privacy response into typed inferences.
///
/// Every requested attribute must be present. Guess lists are cut to three
/// and confidence is rounded into 1–5. Attributes that were not requested are
/// dropped.
pub fn decode_privacy(
    raw: &str,
    attributes: &[AttributeType],
) -> Result<PrivacyAssessment, AiError> {
    let mut parsed: BTreeMap<AttributeType, RawInference> =
        serde_json::from_str(raw).map_err(|e| AiError::decode("privacy assessment", e))?;

    let mut out = BTreeMap::new();
    for attribute in attributes {
        let inf = parsed.remove(attribute).ok_or_else(|| {
            AiError::decode("privacy assessment", format!("missing attribute {attribute}"))
        })?;
        if !inf.confidence.is_finite() {
            return Err(AiError::decode(
                "privacy assessment",
                format!("non-numeric confidence for {attribute}"),
            ));
        }
        let mut value = inf.value;
        value.truncate(MAX_GUESSES);
        let score = inf.score.map(|mut s| {
            s.resize(value.len(), 0);
            s
        });
        out.insert(
            *attribute,
            AttributeInference {
                inference: inf.inference,
                value,
                confidence: inf.confidence.round().clamp(1.0, 5.0) as u8,
                score,
            },
        );
    }
    if !parsed.is_empty() {
        debug!(extra = parsed.len(), "dropping attributes that were not requested");
    }
    Ok(PrivacyAssessment(out))
}

/// Score every unscored inference that has a ground-truth value.
pub fn score_assessment(
    assessment: &mut PrivacyAssessment,
    truth: &GroundTruth,
    matcher: &dyn GuessMatcher,
) {
    for (attribute, inference) in assessment.0.iter_mut() {
        if inference.score.is_some() {
            continue;
        }
        let Some(known) = truth.get(attribute) else {
            continue;
        };
        inference.score = Some(
            inference
                .value
                .iter()
                .map(|guess| u8::from(matcher.matches(*attribute, guess, known)))
                .collect(),
        );
    }
}
