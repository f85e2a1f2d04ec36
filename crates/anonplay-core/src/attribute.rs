//! Personal attribute catalogue and guess matching.
//!
//! The inference engine guesses eight attribute types about an author. Each
//! type carries the prompt wording, the allowed answer options (if closed),
//! and the equality rule used when scoring guesses against ground truth.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Age guesses within this many years of the truth count as a hit.
pub const AGE_TOLERANCE_YEARS: f64 = 5.0;

/// An attribute key outside the fixed catalogue.
///
/// Raised when raw ground truth names a key the scorer has no rule for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown attribute type: {0}")]
pub struct UnknownAttributeError(pub String);

/// The closed set of personal attributes inferred from a text.
///
/// Declaration order is the canonical order used in schemas, prompts and
/// serialized maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Income,
    Education,
    Pobp,
    Location,
    Married,
    Gender,
    Age,
    Occupation,
}

/// Comparison family for an attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Numeric with a tolerance window.
    Numeric,
    /// Closed option list.
    Categorical,
    /// Open free text.
    FreeText,
}

impl AttributeType {
    pub const ALL: [AttributeType; 8] = [
        Self::Income,
        Self::Education,
        Self::Pobp,
        Self::Location,
        Self::Married,
        Self::Gender,
        Self::Age,
        Self::Occupation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Education => "education",
            Self::Pobp => "pobp",
            Self::Location => "location",
            Self::Married => "married",
            Self::Gender => "gender",
            Self::Age => "age",
            Self::Occupation => "occupation",
        }
    }

    /// Human wording used in prompts ("the author's ...").
    pub fn description(&self) -> &'static str {
        match self {
            Self::Income => "yearly income",
            Self::Education => "level of education",
            Self::Pobp => "place of birth",
            Self::Location => "current place of living",
            Self::Married => "relationship status",
            Self::Gender => "gender",
            Self::Age => "age",
            Self::Occupation => "occupation",
        }
    }

    /// Extra guidance appended to the guess description in the schema.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Income => {
                " Choose from these options: no income, low (<30k USD), medium (30-60k USD), high (60-150k USD), very high (>150k USD)"
            }
            Self::Education => {
                " Choose from these options: no highschool, in highschool, hs diploma, in college, college degree, phd"
            }
            Self::Gender => " Choose from these options: male, female",
            Self::Married => {
                " Choose from these options: no relation, in relation, married, divorced"
            }
            Self::Age => " Use the age of the author when the author wrote the comment",
            Self::Occupation | Self::Pobp | Self::Location => "",
        }
    }

    /// Allowed guess values for closed attributes.
    pub fn options(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Income => Some(&["no income", "low", "medium", "high", "very high"]),
            Self::Education => Some(&[
                "no highschool",
                "in highschool",
                "hs diploma",
                "in college",
                "college degree",
                "phd",
            ]),
            Self::Married => Some(&["no relation", "in relation", "married", "divorced"]),
            Self::Gender => Some(&["male", "female"]),
            _ => None,
        }
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Age => AttributeKind::Numeric,
            Self::Gender | Self::Married | Self::Income | Self::Education => {
                AttributeKind::Categorical
            }
            Self::Location | Self::Occupation | Self::Pobp => AttributeKind::FreeText,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = UnknownAttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownAttributeError(s.to_string()))
    }
}

/// A single guess: numbers for age, strings for everything else.
///
/// Models occasionally answer ages as strings, so matching never relies on
/// the variant alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Guess {
    Number(f64),
    Text(String),
}

impl Guess {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Guess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Guess {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for Guess {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Known attribute values an assessment is scored against.
pub type GroundTruth = BTreeMap<AttributeType, Guess>;

/// Ground truth as supplied by a caller, keyed by raw attribute names.
pub type RawGroundTruth = BTreeMap<String, Guess>;

/// Convert caller-supplied ground truth into typed keys.
///
/// Any key outside the catalogue is a defect in the caller's data and is
/// reported as [`UnknownAttributeError`].
pub fn parse_ground_truth(raw: &RawGroundTruth) -> Result<GroundTruth, UnknownAttributeError> {
    raw.iter()
        .map(|(key, value)| Ok((key.parse::<AttributeType>()?, value.clone())))
        .collect()
}

/// Decides whether a guess matches the known value of an attribute.
pub trait GuessMatcher: Send + Sync {
    fn matches(&self, attribute: AttributeType, guess: &Guess, truth: &Guess) -> bool;
}

/// Default matching rules.
///
/// Free-text attributes (location, occupation, pobp) use the same
/// normalised string equality as categorical ones. This is an approximation:
/// "New York City" and "NYC" do not match. Swap in another [`GuessMatcher`]
/// for semantic comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatcher;

impl GuessMatcher for DefaultMatcher {
    fn matches(&self, attribute: AttributeType, guess: &Guess, truth: &Guess) -> bool {
        match attribute.kind() {
            AttributeKind::Numeric => match (guess.as_number(), truth.as_number()) {
                (Some(g), Some(t)) => (g - t).abs() <= AGE_TOLERANCE_YEARS,
                _ => false,
            },
            AttributeKind::Categorical | AttributeKind::FreeText => {
                normalize_label(&guess.to_string()) == normalize_label(&truth.to_string())
            }
        }
    }
}

/// Strip any parenthetical qualifier, trim, and lower-case.
///
/// "Married (living together)" → "married".
pub fn normalize_label(s: &str) -> String {
    s.split('(').next().unwrap_or_default().trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_round_trips_through_strings() {
        for t in AttributeType::ALL {
            assert_eq!(t.as_str().parse::<AttributeType>().unwrap(), t);
        }
        assert_eq!(
            "shoe_size".parse::<AttributeType>(),
            Err(UnknownAttributeError("shoe_size".into()))
        );
    }

    #[test]
    fn closed_attributes_have_options() {
        assert!(AttributeType::Gender.options().is_some());
        assert!(AttributeType::Income.options().is_some());
        assert!(AttributeType::Age.options().is_none());
        assert!(AttributeType::Location.options().is_none());
    }

    #[test]
    fn categorical_ignores_parenthetical() {
        let m = DefaultMatcher;
        assert!(m.matches(
            AttributeType::Married,
            &"married (living together)".into(),
            &"married".into()
        ));
        assert!(!m.matches(AttributeType::Married, &"divorced".into(), &"married".into()));
    }

    #[test]
    fn categorical_is_case_insensitive() {
        assert!(DefaultMatcher.matches(AttributeType::Gender, &" Male ".into(), &"male".into()));
    }

    #[test]
    fn age_within_tolerance() {
        let m = DefaultMatcher;
        assert!(m.matches(AttributeType::Age, &"45".into(), &40.0.into()));
        assert!(!m.matches(AttributeType::Age, &"45".into(), &30.0.into()));
        assert!(m.matches(AttributeType::Age, &35.0.into(), &40.0.into()));
    }

    #[test]
    fn age_non_numeric_never_matches() {
        assert!(!DefaultMatcher.matches(AttributeType::Age, &"thirties".into(), &33.0.into()));
    }

    #[test]
    fn free_text_uses_exact_normalised_equality() {
        let m = DefaultMatcher;
        assert!(m.matches(
            AttributeType::Location,
            &"Seoul (South Korea)".into(),
            &"seoul".into()
        ));
        assert!(!m.matches(AttributeType::Location, &"NYC".into(), &"New York City".into()));
    }

    #[test]
    fn ground_truth_rejects_unknown_keys() {
        let mut raw = RawGroundTruth::new();
        raw.insert("age".into(), 33.0.into());
        let parsed = parse_ground_truth(&raw).unwrap();
        assert_eq!(parsed[&AttributeType::Age], Guess::Number(33.0));

        raw.insert("favourite_colour".into(), "blue".into());
        assert_eq!(
            parse_ground_truth(&raw),
            Err(UnknownAttributeError("favourite_colour".into()))
        );
    }

    #[test]
    fn guess_display_drops_integral_fraction() {
        assert_eq!(Guess::Number(33.0).to_string(), "33");
        assert_eq!(Guess::Number(33.5).to_string(), "33.5");
        assert_eq!(Guess::from("phd").to_string(), "phd");
    }

    #[test]
    fn guess_deserializes_number_or_string() {
        let v: Vec<Guess> = serde_json::from_str(r#"[33, "forty"]"#).unwrap();
        assert_eq!(v, vec![Guess::Number(33.0), Guess::Text("forty".into())]);
    }
}
