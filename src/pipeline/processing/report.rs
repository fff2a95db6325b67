use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::matching::MatchResult;
use crate::constants::*;

/// Execution mode of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Mode {
    /// Classify only; no repository mutation
    Preview,
    /// Classify and write
    Commit { privileged: bool },
}

impl Mode {
    pub fn is_preview(&self) -> bool {
        matches!(self, Mode::Preview)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Preview => "preview",
            Mode::Commit { .. } => "commit",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final classification of one input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported,
    Updated,
    Duplicate,
    Rejected(String),
    FlaggedForReview(String),
    Error(String),
    Skipped(String),
}

impl ImportOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ImportOutcome::Imported => "imported",
            ImportOutcome::Updated => "updated",
            ImportOutcome::Duplicate => "duplicate",
            ImportOutcome::Rejected(_) => "rejected",
            ImportOutcome::FlaggedForReview(_) => "flagged_for_review",
            ImportOutcome::Error(_) => "error",
            ImportOutcome::Skipped(_) => "skipped",
        }
    }

    /// Whether this outcome prevents the batch from being clean
    pub fn is_blocking(&self) -> bool {
        matches!(self, ImportOutcome::Rejected(_) | ImportOutcome::Error(_))
    }
}

/// A reference and what it resolved to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMatch {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub result: MatchResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResultEntry {
    /// Position of the record in the submitted batch
    pub index: usize,
    pub outcome: ImportOutcome,
    pub message: String,
    pub matched_artists: Vec<EntityMatch>,
    pub matched_venue: Option<EntityMatch>,
    pub warnings: Vec<String>,
    /// Created, updated, or colliding show; a placeholder in Preview
    pub show_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub imported: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub pending_review: usize,
    pub errors: usize,
    pub skipped: usize,
    pub can_import_all: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    #[serde(flatten)]
    pub mode: Mode,
    pub per_record: Vec<ImportResultEntry>,
    pub summary: ImportSummary,
}

impl ImportReport {
    pub fn messages(&self) -> Vec<&str> {
        self.per_record.iter().map(|e| e.message.as_str()).collect()
    }
}

/// Fold ordered per-record entries into a report
pub fn aggregate(mode: Mode, per_record: Vec<ImportResultEntry>) -> ImportReport {
    let mut summary = ImportSummary {
        total: per_record.len(),
        ..Default::default()
    };
    for entry in &per_record {
        match entry.outcome {
            ImportOutcome::Imported => summary.imported += 1,
            ImportOutcome::Updated => summary.updated += 1,
            ImportOutcome::Duplicate => summary.duplicates += 1,
            ImportOutcome::Rejected(_) => summary.rejected += 1,
            ImportOutcome::FlaggedForReview(_) => summary.pending_review += 1,
            ImportOutcome::Error(_) => summary.errors += 1,
            ImportOutcome::Skipped(_) => summary.skipped += 1,
        }
    }
    summary.can_import_all = !per_record.iter().any(|e| e.outcome.is_blocking());

    ImportReport {
        mode,
        per_record,
        summary,
    }
}

/// Render the prefixed status line for one outcome. `label` is absent only
/// when the record could not be parsed.
pub fn render_message(outcome: &ImportOutcome, label: Option<&str>, mode: Mode) -> String {
    let preview = mode.is_preview();
    let label = label.unwrap_or("record");
    match outcome {
        ImportOutcome::Imported => {
            let prefix = if preview { PREFIX_WOULD_IMPORT } else { PREFIX_IMPORTED };
            format!("{}: {}", prefix, label)
        }
        ImportOutcome::Updated => {
            let prefix = if preview { PREFIX_WOULD_UPDATE } else { PREFIX_UPDATED };
            format!("{}: {}", prefix, label)
        }
        ImportOutcome::Duplicate => format!("{}: {} already exists", PREFIX_DUPLICATE, label),
        ImportOutcome::FlaggedForReview(reason) => {
            let prefix = if preview { PREFIX_WOULD_FLAG } else { PREFIX_FLAGGED };
            format!("{}: {} ({})", prefix, label, reason)
        }
        ImportOutcome::Rejected(reason) => format!("{}: {}: {}", PREFIX_REJECTED, label, reason),
        ImportOutcome::Error(reason) => format!("{}: {}: {}", PREFIX_ERROR, label, reason),
        ImportOutcome::Skipped(reason) => format!("{}: {} ({})", PREFIX_SKIP, label, reason),
    }
}

/// Render an error for a record that never produced a label
pub fn render_unlabelled_error(reason: &str) -> String {
    format!("{}: {}", PREFIX_ERROR, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &str = "The National @ Valley Bar (2026-03-20)";

    fn entry(index: usize, outcome: ImportOutcome) -> ImportResultEntry {
        ImportResultEntry {
            index,
            message: render_message(&outcome, Some(LABEL), Mode::Commit { privileged: false }),
            outcome,
            matched_artists: Vec::new(),
            matched_venue: None,
            warnings: Vec::new(),
            show_id: None,
        }
    }

    #[test]
    fn test_commit_and_preview_prefixes() {
        let commit = Mode::Commit { privileged: true };
        assert_eq!(
            render_message(&ImportOutcome::Imported, Some(LABEL), commit),
            "IMPORTED: The National @ Valley Bar (2026-03-20)"
        );
        assert_eq!(
            render_message(&ImportOutcome::Imported, Some(LABEL), Mode::Preview),
            "WOULD IMPORT: The National @ Valley Bar (2026-03-20)"
        );
        assert_eq!(
            render_message(&ImportOutcome::Updated, Some(LABEL), Mode::Preview),
            "WOULD UPDATE: The National @ Valley Bar (2026-03-20)"
        );
        assert_eq!(
            render_message(&ImportOutcome::FlaggedForReview("check".into()), Some(LABEL), Mode::Preview),
            "WOULD FLAG FOR REVIEW: The National @ Valley Bar (2026-03-20) (check)"
        );
    }

    #[test]
    fn test_non_simulated_prefixes_match_across_modes() {
        for outcome in [
            ImportOutcome::Duplicate,
            ImportOutcome::Rejected("past".into()),
            ImportOutcome::Error("boom".into()),
            ImportOutcome::Skipped("status 'cancelled'".into()),
        ] {
            assert_eq!(
                render_message(&outcome, Some(LABEL), Mode::Preview),
                render_message(&outcome, Some(LABEL), Mode::Commit { privileged: false })
            );
        }
        assert_eq!(
            render_message(&ImportOutcome::Duplicate, Some(LABEL), Mode::Preview),
            "DUPLICATE: The National @ Valley Bar (2026-03-20) already exists"
        );
        assert_eq!(
            render_unlabelled_error("unparseable event date 'soon'"),
            "ERROR: unparseable event date 'soon'"
        );
    }

    #[test]
    fn test_aggregate_counts_and_order() {
        let report = aggregate(
            Mode::Commit { privileged: false },
            vec![
                entry(0, ImportOutcome::Imported),
                entry(1, ImportOutcome::Error("db down".into())),
                entry(2, ImportOutcome::Duplicate),
                entry(3, ImportOutcome::Skipped("cancelled".into())),
            ],
        );
        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.imported, 1);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.duplicates, 1);
        assert_eq!(report.summary.skipped, 1);
        assert!(!report.summary.can_import_all);
        let indices: Vec<usize> = report.per_record.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_review_and_skip_keep_batch_clean() {
        let report = aggregate(
            Mode::Preview,
            vec![
                entry(0, ImportOutcome::FlaggedForReview("maybe".into())),
                entry(1, ImportOutcome::Skipped("postponed".into())),
                entry(2, ImportOutcome::Duplicate),
            ],
        );
        assert_eq!(report.summary.pending_review, 1);
        assert!(report.summary.can_import_all);
    }

    #[test]
    fn test_report_serializes_mode() {
        let report = aggregate(Mode::Commit { privileged: true }, vec![entry(0, ImportOutcome::Imported)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "commit");
        assert_eq!(json["privileged"], true);
        assert_eq!(json["per_record"][0]["outcome"]["kind"], "imported");
        assert_eq!(json["summary"]["imported"], 1);
    }
}
