//! Data carried between pipeline stages.
//!
//! ```text
//! RawAnnotation ──sanitize──▶ Annotation ─┐
//! PdfMetadata ────────────────────────────┼──assemble──▶ EnrichedRecord
//! ParsedFilename + MatchResult ───────────┘
//! ```
//!
//! [`EnrichedRecord`] is the single source of truth for every renderer.
//! Optional metadata is `Option`, never an empty-string sentinel, so
//! consumers can tell "absent" from "empty".

use crate::error::HighlightError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One highlight as produced by the extraction adapter, before cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnotation {
    /// Text under the highlight; may span lines and carry PDF artefacts.
    pub text: String,
    /// 1-indexed page number.
    pub page: u32,
    /// Hex RGB colour such as `#f9e196`.
    pub color: Option<String>,
    /// Popup comment attached to the highlight.
    pub note: Option<String>,
}

/// A sanitised highlight as it appears in the enriched record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    #[serde(rename = "page_number")]
    pub page: u32,
    pub color: Option<String>,
    pub note: Option<String>,
}

/// Document-level metadata embedded in the PDF itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// DOI found in the subject, keywords or title fields.
    pub doi: Option<String>,
    pub page_count: usize,
}

/// Resolved bibliographic metadata for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub title: Option<String>,
    pub short_title: Option<String>,
    pub year: Option<i32>,
    pub entry_type: Option<String>,
    pub citation_key: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub editors: Vec<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
}

/// Annotations plus resolved metadata; immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub meta: Meta,
    /// Extraction order, never re-sorted.
    #[serde(rename = "data")]
    pub annotations: Vec<Annotation>,
}

impl EnrichedRecord {
    /// Read a record previously written by [`crate::export::json`].
    pub fn from_json_file(path: &Path) -> Result<Self, HighlightError> {
        let raw = std::fs::read_to_string(path).map_err(|e| HighlightError::RecordRead {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| HighlightError::RecordRead {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Metadata fields a complete record should have but this one lacks.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.meta.citation_key.is_none() {
            missing.push("citation_key");
        }
        if self.meta.year.is_none() {
            missing.push("year");
        }
        if self.meta.authors.is_empty() && self.meta.editors.is_empty() {
            missing.push("authors");
        }
        missing
    }
}
