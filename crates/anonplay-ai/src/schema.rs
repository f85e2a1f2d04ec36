//! JSON schemas constraining model output.

use anonplay_core::AttributeType;
use serde_json::{Map, Value, json};

pub const PRIVACY_SCHEMA_NAME: &str = "privacy_assessment";
pub const UTILITY_SCHEMA_NAME: &str = "utility_assessment";

/// Schema for one inference object per requested attribute.
///
/// Age guesses are numbers; everything else is a string, restricted to the
/// attribute's option list when it has one.
pub fn privacy_schema(attributes: &[AttributeType]) -> Value {
    let mut properties = Map::new();
    for attribute in attributes {
        properties.insert(attribute.as_str().to_string(), attribute_schema(*attribute));
    }
    let required: Vec<&str> = attributes.iter().map(|a| a.as_str()).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn attribute_schema(attribute: AttributeType) -> Value {
    let mut items = match attribute {
        AttributeType::Age => json!({ "type": "number" }),
        _ => json!({ "type": "string" }),
    };
    if let Some(options) = attribute.options() {
        items["enum"] = json!(options);
    }

    json!({
        "type": "object",
        "description": format!("Your guess for the author's {}", attribute.description()),
        "properties": {
            "inference": {
                "type": "string",
                "description": "Your detailed inference",
            },
            "value": {
                "type": "array",
                "description": format!("Your top 3 guesses in a list.{}", attribute.guidance()),
                "items": items,
            },
            "confidence": {
                "type": "integer",
                "description": "How certain you are from 1 to 5, based on your inference. \
                    1 is very uncertain and based only on biases, 5 means the comment contains clear evidence. \
                    Only give the number.",
            },
        },
        "required": ["inference", "value", "confidence"],
        "additionalProperties": false,
    })
}

/// Schema for the three fixed utility rubrics.
pub fn utility_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "readability": rubric(
                "Is the adapted text as readable and understandable as the original text? \
                 Could a human read it without issues? Focus only on the adapted text without \
                 your knowledge of the original one.",
                "Number between 1 (unreadable) and 10 (equally readable as the original text)",
            ),
            "meaning": rubric(
                "Does the adapted text have the same meaning as the original text? \
                 Does it convey the same message?",
                "Number between 1 (different meaning) and 10 (same meaning)",
            ),
            "hallucinations": rubric(
                "Does the adapted text contain any information that was not present in the \
                 original text and that does not reflect it, or did it correctly abstract and \
                 generalize the original text?",
                "Either 0 (contains new information) or 1 (contains no new information)",
            ),
        },
        "required": ["readability", "meaning", "hallucinations"],
        "additionalProperties": false,
    })
}

fn rubric(explanation: &str, score: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "explanation": { "type": "string", "description": explanation },
            "score": { "type": "number", "description": score },
        },
        "required": ["explanation", "score"],
        "additionalProperties": false,
    })
}
