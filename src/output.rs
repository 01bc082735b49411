//! Run-level results: the outcome tri-state and per-document reports.

use crate::error::SkippedEntry;
use crate::model::PdfMetadata;
use crate::pipeline::filename::ParsedFilename;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a single document run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Matched with full confidence and complete metadata.
    Ok,
    /// Processed, but matching was incomplete or metadata is missing.
    Warning,
    /// No highlights found; nothing was written.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Ok => "ok",
            Outcome::Warning => "warning",
            Outcome::Skipped => "skipped",
        })
    }
}

/// Files written for one document; `None` when that format was not selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFiles {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub markdown: Option<PathBuf>,
}

/// Human-readable summary of one document run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Base name of the source PDF.
    pub file_name: String,
    pub outcome: Outcome,
    pub highlight_count: usize,
    /// Citation key of the matched entry.
    pub matched_key: Option<String>,
    /// Match confidence in `[0, 1]`; 0 when unmatched.
    pub confidence: f64,
    /// What decided the match: `citation-key`, `exact-title`, `doi`,
    /// `filename-similarity`, `metadata-similarity`, or `enriched-json`
    /// when re-rendered from a JSON record.
    pub strategy: Option<String>,
    /// Metadata fields absent from the enriched record.
    pub missing_fields: Vec<String>,
    /// Reasons behind a `warning` outcome.
    pub warnings: Vec<String>,
    pub files: WrittenFiles,
}

impl DocumentReport {
    /// Report for a document without highlights.
    pub fn skipped(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            outcome: Outcome::Skipped,
            highlight_count: 0,
            matched_key: None,
            confidence: 0.0,
            strategy: None,
            missing_fields: Vec::new(),
            warnings: vec!["no highlights found".to_string()],
            files: WrittenFiles::default(),
        }
    }

    /// One-line summary, e.g. `ok  smith2020 (1.00)  12 highlights`.
    pub fn summary_line(&self) -> String {
        let mut line = format!("{}  {}", self.outcome, self.file_name);
        match &self.matched_key {
            Some(key) => line.push_str(&format!("  → {key} ({:.2})", self.confidence)),
            None if self.outcome != Outcome::Skipped => line.push_str("  → no match"),
            None => {}
        }
        line.push_str(&format!("  {} highlights", self.highlight_count));
        if !self.warnings.is_empty() {
            line.push_str(&format!("  [{}]", self.warnings.join("; ")));
        }
        line
    }
}

/// Result of [`crate::convert::inspect`]: what a document offers before
/// any matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectReport {
    pub file_name: String,
    pub highlight_count: usize,
    pub metadata: PdfMetadata,
    /// Hints parsed from the file name.
    pub filename: ParsedFilename,
}

/// A document that failed fatally inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub file_name: String,
    pub error: String,
}

/// Aggregated result of [`crate::convert::process_batch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Completed documents, in input order.
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
    /// Bibliography entries left out of the store the batch matched against.
    #[serde(default)]
    pub skipped_entries: Vec<SkippedEntry>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.documents.iter().filter(|d| d.outcome == outcome).count()
    }

    pub fn total_highlights(&self) -> usize {
        self.documents.iter().map(|d| d.highlight_count).sum()
    }
}
