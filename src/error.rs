//! Error types for the pdf-highlights library.
//!
//! Two distinct error shapes reflect two distinct failure modes:
//!
//! * [`HighlightError`]: **fatal**, the document (or the whole run) cannot
//!   proceed (unreadable PDF, bibliography structurally broken, output
//!   directory not writable). Returned as `Err(HighlightError)` from the
//!   top-level functions.
//!
//! * [`SkippedEntry`]: **non-fatal**, a single bibliography entry was
//!   malformed and left out of the store. Stored on
//!   [`crate::bib::BibStore`] so callers can report them after the load.
//!
//! Weak or failed matches are neither: they travel as
//! [`crate::pipeline::matcher::MatchResult::warning`] and end up as a
//! `warning` outcome rather than an error.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-highlights library.
#[derive(Debug, Error)]
pub enum HighlightError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none (or the wrong one) was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Bibliography errors ───────────────────────────────────────────────
    /// The bibliography file could not be read at all.
    #[error("Failed to read bibliography '{path}': {source}")]
    BibRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bibliography is structurally invalid; no matching is possible.
    #[error("Bibliography is invalid: {0}")]
    BibParse(#[from] BibParseError),

    // ── Record errors ─────────────────────────────────────────────────────
    /// An enriched JSON record could not be read back.
    #[error("Failed to read enriched record '{path}': {detail}")]
    RecordRead { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation or config-file parsing failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Structural problems that make a whole bibliography unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BibParseError {
    /// An entry opens but the file ends before its closing delimiter.
    #[error("entry starting on line {line} is never terminated")]
    Unterminated { line: usize },

    /// Two entries share a citation key.
    #[error("duplicate citation key '{key}' (lines {first_line} and {line})")]
    DuplicateKey {
        key: String,
        first_line: usize,
        line: usize,
    },

    /// Nothing in the file looked like a bibliography entry.
    #[error("no entries found")]
    NoEntries,
}

/// A bibliography entry that was left out of the store.
///
/// Collected during [`crate::bib::BibStore::parse`] and logged as it
/// happens; the load itself continues.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SkippedEntry {
    /// 1-indexed line where the entry starts.
    pub line: usize,
    /// Citation key, when one could be read.
    pub key: Option<String>,
    /// Human-readable reason.
    pub reason: String,
}

impl std::fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "line {} ({}): {}", self.line, key, self.reason),
            None => write!(f, "line {}: {}", self.line, self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_display() {
        let e = HighlightError::from(BibParseError::DuplicateKey {
            key: "smith2020".into(),
            first_line: 1,
            line: 9,
        });
        let msg = e.to_string();
        assert!(msg.contains("smith2020"), "got: {msg}");
        assert!(msg.contains("lines 1 and 9"), "got: {msg}");
    }

    #[test]
    fn unterminated_display() {
        let e = BibParseError::Unterminated { line: 42 };
        assert!(e.to_string().contains("line 42"));
    }

    #[test]
    fn skipped_entry_display_with_and_without_key() {
        let with_key = SkippedEntry {
            line: 3,
            key: Some("doe2019".into()),
            reason: "missing title".into(),
        };
        assert_eq!(with_key.to_string(), "line 3 (doe2019): missing title");

        let without = SkippedEntry {
            line: 7,
            key: None,
            reason: "missing citation key".into(),
        };
        assert_eq!(without.to_string(), "line 7: missing citation key");
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = HighlightError::OutputWriteFailed {
            path: PathBuf::from("/nope/out.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("/nope/out.md"));
    }
}
