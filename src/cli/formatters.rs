//! Output formatting module for CLI display
//!
//! Keeps presentation (tables, colors, JSON shapes) out of the command handlers.

use colored::Colorize;
use ledger_ingest::commit::CommitSummary;
use ledger_ingest::dedup::DuplicateFlag;
use ledger_ingest::models::{Direction, ParseResult, TransactionDraft};
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

const PREVIEW_ROWS: usize = 10;

/// Outcome for one input file, as reported to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ParseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn format_reports_json(reports: &[FileReport]) -> String {
    serde_json::to_string_pretty(reports)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Header line, draft preview table and warnings for one parsed file
pub fn format_file_report(report: &FileReport, show_all: bool) -> String {
    let mut output = String::new();

    let (Some(result), None) = (&report.result, &report.error) else {
        output.push_str(&format!(
            "\n{} {}: {}\n",
            "✗".red().bold(),
            report.file.bold(),
            report.error.as_deref().unwrap_or("no result")
        ));
        return output;
    };

    output.push_str(&format!(
        "\n{} {} ({} {}): {} drafts, {} warnings\n",
        "✓".green().bold(),
        report.file.bold(),
        result.source.as_str(),
        result.source_type.as_str(),
        result.row_count,
        result.warnings.len()
    ));
    if let Some(commit) = &report.commit {
        output.push_str(&format!(
            "  {} inserted, {} already present\n",
            commit.inserted, commit.skipped
        ));
    }

    if !result.drafts.is_empty() {
        let limit = if show_all { result.drafts.len() } else { PREVIEW_ROWS };
        output.push('\n');
        output.push_str(&format_drafts_table(&result.drafts[..limit.min(result.drafts.len())]));
        output.push('\n');
        if result.drafts.len() > limit {
            output.push_str(&format!(
                "... and {} more drafts (use --all to show them)\n",
                result.drafts.len() - limit
            ));
        }
    }

    for warning in &result.warnings {
        output.push_str(&format!("  {} {}\n", "⚠".yellow().bold(), warning));
    }

    output
}

#[derive(Tabled)]
struct DraftRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Dir")]
    direction: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Counterparty")]
    counterparty: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Account")]
    account: String,
}

pub fn format_drafts_table(drafts: &[TransactionDraft]) -> String {
    let rows: Vec<DraftRow> = drafts
        .iter()
        .map(|d| DraftRow {
            date: d.occurred_at.format("%Y-%m-%d %H:%M").to_string(),
            direction: d.direction.as_str().to_string(),
            amount: format_amount(d),
            counterparty: d.counterparty.clone().unwrap_or_default(),
            description: d.description.clone().unwrap_or_default(),
            account: d.account_name.clone().unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..3), Alignment::right());
    table.to_string()
}

fn format_amount(draft: &TransactionDraft) -> String {
    let currency = draft.currency.as_deref().unwrap_or("");
    let text = format!("{:.2} {}", draft.amount, currency).trim_end().to_string();
    match draft.direction {
        Direction::In => format!("+{}", text).green().to_string(),
        Direction::Out => format!("-{}", text).red().to_string(),
    }
}

#[derive(Tabled)]
struct DuplicateRow {
    #[tabled(rename = "Bank row")]
    bank: String,
    #[tabled(rename = "Platform row")]
    platform: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Δ min")]
    delta: i64,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Duplicate flags; `drafts` is the slice the flags index into
pub fn format_duplicates_table(flags: &[DuplicateFlag], drafts: &[TransactionDraft]) -> String {
    if flags.is_empty() {
        return format!("{} No cross-source duplicates found\n", "ℹ".blue().bold());
    }

    let rows: Vec<DuplicateRow> = flags
        .iter()
        .map(|f| DuplicateRow {
            bank: f.bank_row_id.clone(),
            platform: f.platform_row_id.clone(),
            amount: drafts
                .get(f.bank_index)
                .map(|d| format!("{:.2}", d.amount))
                .unwrap_or_default(),
            delta: f.time_delta_minutes,
            reason: f.reason.as_str().to_string(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    format!(
        "\n{} {} possible duplicates\n\n{}\n",
        "🔁".cyan().bold(),
        flags.len(),
        table
    )
}

pub fn format_duplicates_json(flags: &[DuplicateFlag]) -> String {
    serde_json::to_string_pretty(flags)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicates_message() {
        colored::control::set_override(false);
        let msg = format_duplicates_table(&[], &[]);
        assert!(msg.contains("No cross-source duplicates found"));
    }

    #[test]
    fn test_failed_file_report_shows_error() {
        colored::control::set_override(false);
        let report = FileReport {
            file: "x.pdf".into(),
            result: None,
            commit: None,
            error: Some("unrecognized file: x.pdf".into()),
        };
        let text = format_file_report(&report, false);
        assert!(text.contains("x.pdf"));
        assert!(text.contains("unrecognized file"));
        let json = format_reports_json(&[report]);
        assert!(json.contains("\"error\""));
        assert!(!json.contains("\"result\""));
    }
}
