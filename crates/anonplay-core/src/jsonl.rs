//! Newline-delimited JSON import and export.
//!
//! Inputs are one `{"text", "context", "truth"}` object per line (`editable`
//! and `noneditable` are accepted as aliases). Results are one record per
//! line with the run-local id stripped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attribute::RawGroundTruth;
use crate::error::CoreError;
use crate::model::{InputItem, ItemId, ResultRecord, TextVersion};

/// What to do with an input line that is not a valid item object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedLinePolicy {
    /// Keep the line's position with an empty item.
    #[default]
    Placeholder,
    /// Drop the line.
    Skip,
}

#[derive(Deserialize)]
struct InputLine {
    #[serde(default, alias = "editable")]
    text: Option<String>,
    #[serde(default, alias = "noneditable")]
    context: Option<String>,
    #[serde(default)]
    truth: Option<RawGroundTruth>,
}

#[derive(Serialize)]
struct InputLineRef<'a> {
    text: &'a str,
    context: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    truth: Option<&'a RawGroundTruth>,
}

#[derive(Serialize)]
struct ExportedRecord<'a> {
    context: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    truth: Option<&'a RawGroundTruth>,
    texts: &'a [TextVersion],
}

#[derive(Deserialize)]
struct ImportedRecord {
    #[serde(default)]
    context: String,
    #[serde(default)]
    truth: Option<RawGroundTruth>,
    texts: Vec<TextVersion>,
}

/// Parse input items, one per non-blank line.
///
/// Malformed lines never abort the import; they are logged and handled per
/// `policy`. Missing fields become empty strings.
pub fn parse_inputs(content: &str, policy: MalformedLinePolicy) -> Vec<InputItem> {
    let mut items = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InputLine>(line) {
            Ok(parsed) => items.push(InputItem {
                id: ItemId::new(),
                context: parsed.context.unwrap_or_default(),
                text: parsed.text.unwrap_or_default(),
                ground_truth: parsed.truth,
            }),
            Err(e) => {
                warn!(line = idx + 1, error = %e, ?policy, "malformed input line");
                if policy == MalformedLinePolicy::Placeholder {
                    items.push(InputItem::new(""));
                }
            }
        }
    }
    items
}

/// Read input items from a jsonl file.
pub fn read_inputs(path: &Path, policy: MalformedLinePolicy) -> Result<Vec<InputItem>, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let items = parse_inputs(&content, policy);
    info!(path = %path.display(), count = items.len(), "read input items");
    Ok(items)
}

/// Serialise input items in the import format.
pub fn inputs_to_jsonl(items: &[InputItem]) -> Result<String, CoreError> {
    let mut out = String::new();
    for item in items {
        let line = InputLineRef {
            text: &item.text,
            context: &item.context,
            truth: item.ground_truth.as_ref(),
        };
        out.push_str(&serde_json::to_string(&line)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn write_inputs(path: &Path, items: &[InputItem]) -> Result<(), CoreError> {
    std::fs::write(path, inputs_to_jsonl(items)?)?;
    Ok(())
}

/// Serialise result records, one per line, without their ids.
pub fn results_to_jsonl(records: &[ResultRecord]) -> Result<String, CoreError> {
    let mut out = String::new();
    for record in records {
        let line = ExportedRecord {
            context: &record.context,
            truth: record.ground_truth.as_ref(),
            texts: &record.texts,
        };
        out.push_str(&serde_json::to_string(&line)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn write_results(path: &Path, records: &[ResultRecord]) -> Result<(), CoreError> {
    std::fs::write(path, results_to_jsonl(records)?)?;
    info!(path = %path.display(), count = records.len(), "wrote results");
    Ok(())
}

/// Parse exported result records, assigning each a fresh id.
///
/// Unlike inputs, a malformed result line is an error: a record without its
/// versions cannot be represented.
pub fn parse_results(content: &str) -> Result<Vec<ResultRecord>, CoreError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let parsed: ImportedRecord = serde_json::from_str(line)
                .map_err(|source| CoreError::Json { line: idx + 1, source })?;
            Ok(ResultRecord {
                id: ItemId::new(),
                context: parsed.context,
                ground_truth: parsed.truth,
                texts: parsed.texts,
            })
        })
        .collect()
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRecord>, CoreError> {
    parse_results(&std::fs::read_to_string(path)?)
}
