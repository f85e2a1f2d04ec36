//! Human-readable rendering of run results and statistics.

use anonplay_core::{AggregateStats, AttributeType, Mean, ResultRecord, TextVersion};
use anonplay_engine::{BatchReport, ItemStatus};

const MAX_TEXT_CHARS: usize = 160;

/// Print every record as a card, then the aggregate statistics and the list
/// of unfinished items.
pub fn print_report(report: &BatchReport) {
    for item in &report.items {
        print_record_card(&item.record, &item.status);
    }
    print_stats(&report.stats());
    print_unfinished(report);
    println!(
        "Finished {} in {:.1}s: {} complete, {} incomplete, {} defects",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.elapsed().num_milliseconds() as f64 / 1000.0,
        report.completed(),
        report.incomplete().count(),
        report.defects().count()
    );
}

pub fn print_record_card(record: &ResultRecord, status: &ItemStatus) {
    println!("=== {} ===", record.id);
    println!("  {:<16} {}", "status", status.label());
    if !record.context.is_empty() {
        println!("  {:<16} {}", "context", clip(&record.context));
    }
    println!();

    for (index, version) in record.texts.iter().enumerate() {
        let header = if index == 0 {
            "Original".to_string()
        } else {
            format!("Rewrite {index}")
        };
        print_version(&header, version);
    }
}

fn print_version(header: &str, version: &TextVersion) {
    println!("{header}");
    println!("  {:<16} {}", "text", clip(&version.text));

    match &version.privacy {
        Some(privacy) if !privacy.is_empty() => {
            for (attribute, inference) in privacy.iter() {
                let guess = inference
                    .top_guess()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".into());
                let hit = match inference.top_score() {
                    Some(1) => " hit",
                    Some(_) => " miss",
                    None => "",
                };
                println!(
                    "  {:<16} {guess} (confidence {}){hit}",
                    attribute.as_str(),
                    inference.confidence
                );
            }
        }
        Some(_) => println!("  {:<16} (no attributes)", "privacy"),
        None => println!("  {:<16} (not assessed)", "privacy"),
    }

    match &version.utility {
        Some(utility) => println!(
            "  {:<16} readability {} | meaning {} | hallucinations {}",
            "utility",
            utility.readability.score,
            utility.meaning.score,
            utility.hallucinations.score
        ),
        None => println!("  {:<16} (not assessed)", "utility"),
    }
    println!();
}

pub fn print_stats(stats: &AggregateStats) {
    println!("=== Statistics (version {}) ===", stats.version);
    println!("  {:<16} {}", "records", stats.records);
    println!();

    println!("Privacy (top-guess accuracy)");
    for attribute in AttributeType::ALL {
        if let Some(mean) = stats.privacy.get(&attribute) {
            print_mean(attribute.as_str(), mean);
        }
    }
    print_mean("total", &stats.total);
    println!();

    println!("Utility");
    print_mean("readability", &stats.readability);
    print_mean("meaning", &stats.meaning);
    print_mean("hallucinations", &stats.hallucinations);
    println!();
}

fn print_mean(label: &str, mean: &Mean) {
    match mean.value() {
        Some(value) => println!("  {label:<16} {value:.3} (n={})", mean.count),
        None => println!("  {label:<16} -"),
    }
}

fn print_unfinished(report: &BatchReport) {
    let unfinished: Vec<_> = report.incomplete().chain(report.defects()).collect();
    if unfinished.is_empty() {
        return;
    }
    println!("Unfinished items");
    for item in unfinished {
        let detail = match &item.status {
            ItemStatus::Incomplete { reason } => reason.as_str(),
            ItemStatus::Defect { message } => message.as_str(),
            ItemStatus::Complete => "",
        };
        println!("  {} {:<10} {detail}", item.record.id, item.status.label());
    }
    println!();
}

fn clip(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX_TEXT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("short"), "short");
    }

    #[test]
    fn clip_marks_truncation() {
        let long = "x".repeat(MAX_TEXT_CHARS + 5);
        let clipped = clip(&long);
        assert!(clipped.ends_with('…'));
        assert_eq!(clipped.chars().count(), MAX_TEXT_CHARS + 1);
    }
}
