pub mod attribute;
mod error;
pub mod jsonl;
pub mod model;
pub mod stats;

pub use attribute::{
    AttributeKind, AttributeType, DefaultMatcher, GroundTruth, Guess, GuessMatcher,
    RawGroundTruth, UnknownAttributeError, parse_ground_truth,
};
pub use error::CoreError;
pub use jsonl::MalformedLinePolicy;
pub use model::{
    AttributeInference, CONFIDENCE_THRESHOLD, InputItem, ItemId, PrivacyAssessment,
    ResultRecord, RubricScore, TextVersion, UtilityAssessment,
};
pub use stats::{AggregateStats, Mean};
