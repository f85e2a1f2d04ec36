//! Run data model: input items, result records and their assessed versions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attribute::{AttributeType, GroundTruth, Guess, RawGroundTruth};

/// Inferences below this confidence are too speculative to drive a rewrite
/// or to serve as ground truth for later rounds.
pub const CONFIDENCE_THRESHOLD: u8 = 3;

/// Opaque per-run item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A text submitted for anonymization.
#[derive(Debug, Clone, PartialEq)]
pub struct InputItem {
    pub id: ItemId,
    /// Immutable prefix shown to the privacy evaluator but never rewritten.
    pub context: String,
    /// The editable seed text.
    pub text: String,
    /// Known attribute values for scoring the original, if available.
    pub ground_truth: Option<RawGroundTruth>,
}

impl InputItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            context: String::new(),
            text: text.into(),
            ground_truth: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_ground_truth(mut self, truth: RawGroundTruth) -> Self {
        self.ground_truth = Some(truth);
        self
    }
}

/// One guessed attribute with the model's reasoning and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInference {
    pub inference: String,
    /// Up to three guesses, best first.
    pub value: Vec<Guess>,
    /// Model-reported certainty, 1–5.
    pub confidence: u8,
    /// Per-guess hit (1) or miss (0); present only when scored against truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Vec<u8>>,
}

impl AttributeInference {
    /// The model's best guess.
    pub fn top_guess(&self) -> Option<&Guess> {
        self.value.first()
    }

    /// Whether the best guess hit the truth; `None` when unscored.
    pub fn top_score(&self) -> Option<u8> {
        self.score.as_ref().and_then(|s| s.first().copied())
    }

    pub fn is_confident(&self) -> bool {
        self.confidence >= CONFIDENCE_THRESHOLD
    }
}

/// Attribute inferences for one text version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivacyAssessment(pub BTreeMap<AttributeType, AttributeInference>);

impl PrivacyAssessment {
    pub fn get(&self, attribute: AttributeType) -> Option<&AttributeInference> {
        self.0.get(&attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeType, &AttributeInference)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inferences at or above [`CONFIDENCE_THRESHOLD`].
    pub fn confident(&self) -> impl Iterator<Item = (AttributeType, &AttributeInference)> {
        self.iter().filter(|(_, inf)| inf.is_confident())
    }

    /// Confident top guesses, used as ground truth when re-evaluating rewrites.
    pub fn confident_truth(&self) -> GroundTruth {
        self.confident()
            .filter_map(|(attr, inf)| inf.top_guess().map(|g| (attr, g.clone())))
            .collect()
    }
}

/// Judge verdict for a single rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    pub explanation: String,
    pub score: f64,
}

impl RubricScore {
    fn unexplained(score: f64) -> Self {
        Self {
            explanation: String::new(),
            score,
        }
    }
}

/// Utility of an adapted text relative to the original.
///
/// Readability and meaning are 1–10; hallucinations is 0 (new information
/// introduced) or 1 (none). Ranges are advisory and never enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityAssessment {
    pub readability: RubricScore,
    pub meaning: RubricScore,
    pub hallucinations: RubricScore,
}

impl UtilityAssessment {
    /// Utility of the original against itself: nothing to judge.
    pub fn neutral() -> Self {
        Self {
            readability: RubricScore::unexplained(10.0),
            meaning: RubricScore::unexplained(10.0),
            hallucinations: RubricScore::unexplained(1.0),
        }
    }
}

/// One version of an item's text and its assessments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVersion {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<PrivacyAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility: Option<UtilityAssessment>,
}

impl TextVersion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            privacy: None,
            utility: None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.privacy.is_some() && self.utility.is_some()
    }
}

/// The original text of an item and every anonymized derivative.
///
/// `texts[0]` is the original; `texts[k]` is the k-th rewrite. Versions are
/// only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: ItemId,
    #[serde(default)]
    pub context: String,
    #[serde(default, rename = "truth", skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<RawGroundTruth>,
    pub texts: Vec<TextVersion>,
}

impl ResultRecord {
    pub fn original(&self) -> &TextVersion {
        &self.texts[0]
    }

    /// The first rewrite, if one was produced.
    pub fn first_derivative(&self) -> Option<&TextVersion> {
        self.texts.get(1)
    }

    /// Text shown to the privacy evaluator: context and version joined.
    pub fn privacy_input(&self, version: usize) -> String {
        let text = &self.texts[version].text;
        if self.context.is_empty() {
            text.trim().to_string()
        } else {
            format!("{} {}", self.context, text).trim().to_string()
        }
    }

    /// True when all `round` rewrites exist and every version is assessed.
    pub fn is_complete(&self, round: usize) -> bool {
        self.texts.len() == round + 1 && self.texts.iter().all(TextVersion::is_evaluated)
    }
}

impl From<InputItem> for ResultRecord {
    fn from(item: InputItem) -> Self {
        Self {
            id: item.id,
            context: item.context,
            ground_truth: item.ground_truth,
            texts: vec![TextVersion::new(item.text)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inference(value: Vec<Guess>, confidence: u8) -> AttributeInference {
        AttributeInference {
            inference: "reasoning".into(),
            value,
            confidence,
            score: None,
        }
    }

    #[test]
    fn neutral_utility_is_perfect() {
        let u = UtilityAssessment::neutral();
        assert_eq!(u.readability.score, 10.0);
        assert_eq!(u.meaning.score, 10.0);
        assert_eq!(u.hallucinations.score, 1.0);
        assert!(u.readability.explanation.is_empty());
    }

    #[test]
    fn top_guess_is_first_value() {
        let inf = inference(vec!["male".into(), "female".into()], 4);
        assert_eq!(inf.top_guess(), Some(&Guess::Text("male".into())));
        assert_eq!(inference(vec![], 4).top_guess(), None);
    }

    #[test]
    fn confident_truth_keeps_threshold_and_above() {
        let mut map = BTreeMap::new();
        map.insert(AttributeType::Age, inference(vec![33.0.into(), 35.0.into()], 3));
        map.insert(AttributeType::Gender, inference(vec!["male".into()], 2));
        map.insert(AttributeType::Location, inference(vec!["Seoul".into()], 5));
        let truth = PrivacyAssessment(map).confident_truth();

        assert_eq!(truth.len(), 2);
        assert_eq!(truth[&AttributeType::Age], Guess::Number(33.0));
        assert_eq!(truth[&AttributeType::Location], Guess::Text("Seoul".into()));
        assert!(!truth.contains_key(&AttributeType::Gender));
    }

    #[test]
    fn privacy_input_omits_empty_context() {
        let record = ResultRecord::from(InputItem::new("I live in Seoul."));
        assert_eq!(record.privacy_input(0), "I live in Seoul.");

        let record =
            ResultRecord::from(InputItem::new("I live in Seoul.").with_context("Where do you live?"));
        assert_eq!(record.privacy_input(0), "Where do you live? I live in Seoul.");
    }

    #[test]
    fn record_seeds_original_version() {
        let item = InputItem::new("hello").with_context("ctx");
        let id = item.id;
        let record = ResultRecord::from(item);
        assert_eq!(record.id, id);
        assert_eq!(record.texts.len(), 1);
        assert_eq!(record.original().text, "hello");
        assert!(!record.is_complete(1));
    }

    #[test]
    fn privacy_serializes_with_attribute_keys() {
        let mut map = BTreeMap::new();
        map.insert(AttributeType::Age, inference(vec![33.0.into()], 4));
        let json = serde_json::to_value(PrivacyAssessment(map)).unwrap();
        assert_eq!(json["age"]["value"][0], 33.0);
        assert!(json["age"].get("score").is_none());
    }
}
