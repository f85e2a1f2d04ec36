//! Corpus-level aggregate statistics over finished result records.
//!
//! Computed read-only after a run completes; nothing here is persisted.

use std::collections::BTreeMap;

use crate::attribute::AttributeType;
use crate::model::{ResultRecord, TextVersion};

/// Running mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mean {
    pub sum: f64,
    pub count: usize,
}

impl Mean {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// `None` when nothing was observed.
    pub fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Privacy hit rates and utility means across a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    /// Version index the statistics were computed over.
    pub version: usize,
    /// Mean top-guess score per attribute type.
    pub privacy: BTreeMap<AttributeType, Mean>,
    /// Mean top-guess score across all scored attributes.
    pub total: Mean,
    pub readability: Mean,
    pub meaning: Mean,
    pub hallucinations: Mean,
    /// Records that had the requested version.
    pub records: usize,
}

impl AggregateStats {
    /// Statistics over the first rewrite of every record.
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        Self::for_version(records, 1)
    }

    /// Statistics over `texts[version]` of every record that has it.
    ///
    /// Attributes without a score (no ground truth at evaluation time) are
    /// left out of the means rather than counted as misses.
    pub fn for_version<'a>(
        records: impl IntoIterator<Item = &'a ResultRecord>,
        version: usize,
    ) -> Self {
        let mut stats = Self {
            version,
            ..Self::default()
        };

        for text in records.into_iter().filter_map(|r| r.texts.get(version)) {
            stats.records += 1;
            stats.add_privacy(text);
            if let Some(utility) = &text.utility {
                stats.readability.add(utility.readability.score);
                stats.meaning.add(utility.meaning.score);
                stats.hallucinations.add(utility.hallucinations.score);
            }
        }
        stats
    }

    fn add_privacy(&mut self, text: &TextVersion) {
        let Some(privacy) = &text.privacy else {
            return;
        };
        for (attribute, inference) in privacy.iter() {
            if let Some(score) = inference.top_score() {
                self.privacy.entry(attribute).or_default().add(score as f64);
                self.total.add(score as f64);
            }
        }
    }

    pub fn attribute(&self, attribute: AttributeType) -> Option<f64> {
        self.privacy.get(&attribute).and_then(Mean::value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttributeInference, InputItem, PrivacyAssessment, RubricScore, UtilityAssessment,
    };

    fn scored(attribute: AttributeType, score: u8) -> PrivacyAssessment {
        let mut map = BTreeMap::new();
        map.insert(
            attribute,
            AttributeInference {
                inference: String::new(),
                value: vec![33.0.into()],
                confidence: 4,
                score: Some(vec![score]),
            },
        );
        PrivacyAssessment(map)
    }

    fn utility(readability: f64, meaning: f64, hallucinations: f64) -> UtilityAssessment {
        let rubric = |score| RubricScore {
            explanation: String::new(),
            score,
        };
        UtilityAssessment {
            readability: rubric(readability),
            meaning: rubric(meaning),
            hallucinations: rubric(hallucinations),
        }
    }

    fn record_with_rewrite(privacy: PrivacyAssessment, util: UtilityAssessment) -> ResultRecord {
        let mut record = ResultRecord::from(InputItem::new("original"));
        record.texts.push(TextVersion {
            text: "rewrite".into(),
            privacy: Some(privacy),
            utility: Some(util),
        });
        record
    }

    #[test]
    fn age_and_total_means() {
        let records = vec![
            record_with_rewrite(scored(AttributeType::Age, 1), utility(9.0, 8.0, 1.0)),
            record_with_rewrite(scored(AttributeType::Age, 0), utility(7.0, 6.0, 0.0)),
        ];
        let stats = AggregateStats::compute(&records);
        assert_eq!(stats.attribute(AttributeType::Age), Some(0.5));
        assert_eq!(stats.total.value(), Some(0.5));
        assert_eq!(stats.readability.value(), Some(8.0));
        assert_eq!(stats.meaning.value(), Some(7.0));
        assert_eq!(stats.hallucinations.value(), Some(0.5));
        assert_eq!(stats.records, 2);
    }

    #[test]
    fn records_without_rewrite_are_skipped() {
        let records = vec![
            record_with_rewrite(scored(AttributeType::Gender, 1), utility(10.0, 10.0, 1.0)),
            ResultRecord::from(InputItem::new("never rewritten")),
        ];
        let stats = AggregateStats::compute(&records);
        assert_eq!(stats.records, 1);
        assert_eq!(stats.attribute(AttributeType::Gender), Some(1.0));
        assert_eq!(stats.attribute(AttributeType::Age), None);
    }

    #[test]
    fn unscored_attributes_do_not_count() {
        let mut privacy = scored(AttributeType::Age, 1);
        privacy.0.insert(
            AttributeType::Location,
            AttributeInference {
                inference: String::new(),
                value: vec!["Seoul".into()],
                confidence: 5,
                score: None,
            },
        );
        let stats = AggregateStats::compute(&[record_with_rewrite(privacy, utility(9.0, 9.0, 1.0))]);
        assert_eq!(stats.total.count, 1);
        assert_eq!(stats.attribute(AttributeType::Location), None);
    }

    #[test]
    fn empty_batch_has_no_means() {
        let stats = AggregateStats::compute(&[]);
        assert_eq!(stats.total.value(), None);
        assert_eq!(stats.readability.value(), None);
    }
}
