//! Matcher: resolve a document to at most one bibliography entry.
//!
//! ## Stages
//!
//! Each stage is a pure function returning `Option<Candidate>`; `None` means
//! "inconclusive, ask the next stage". The first conclusive stage wins:
//!
//! 1. **Exact**: the file stem is a citation key, or the primary source's
//!    title equals an entry title after case/punctuation folding. Confidence 1.0.
//! 2. **DOI**: a DOI sniffed from the PDF equals an entry's DOI. Confidence 1.0.
//! 3. **Similarity on the primary source**: normalised Levenshtein similarity
//!    of titles at or above the threshold, confirmed by at least one shared
//!    author surname and a non-conflicting year. Confidence is the score.
//! 4. **Similarity on the secondary source**: stage 3 repeated once.
//! 5. **No match**: confidence 0.0, warning.
//!
//! The primary source is the parsed file name unless
//! [`SourcePrecedence::MetadataFirst`] is configured.
//!
//! Ties among equal scores go to the most recent year, then the smallest
//! citation key, so the result never depends on file order.
//!
//! The matcher never fails. Doubtful outcomes set
//! [`MatchResult::warning`] and list their reasons.

use crate::bib::{BibEntry, BibStore};
use crate::config::{MatchThresholds, SourcePrecedence};
use crate::model::PdfMetadata;
use crate::pipeline::filename::ParsedFilename;
use crate::pipeline::names::{fold_diacritics, surname_key};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Which stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    CitationKey,
    ExactTitle,
    Doi,
    FilenameSimilarity,
    MetadataSimilarity,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchStrategy::CitationKey => "citation-key",
            MatchStrategy::ExactTitle => "exact-title",
            MatchStrategy::Doi => "doi",
            MatchStrategy::FilenameSimilarity => "filename-similarity",
            MatchStrategy::MetadataSimilarity => "metadata-similarity",
        })
    }
}

/// Outcome of matching one document.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub entry: Option<&'a BibEntry>,
    /// In `[0, 1]`; 0 when unmatched.
    pub confidence: f64,
    /// Set when unmatched, below the low-confidence threshold, or matched
    /// to an entry lacking year or people.
    pub warning: bool,
    pub strategy: Option<MatchStrategy>,
    /// Why `warning` is set.
    pub reasons: Vec<String>,
}

impl MatchResult<'_> {
    pub fn is_matched(&self) -> bool {
        self.entry.is_some()
    }

    fn no_match() -> Self {
        Self {
            entry: None,
            confidence: 0.0,
            warning: true,
            strategy: None,
            reasons: vec!["no matching bibliography entry".to_string()],
        }
    }
}

/// Where a piece of title/author evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceSource {
    Filename,
    Metadata,
}

/// Title, authors and year from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub source: EvidenceSource,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
}

static RE_METADATA_AUTHOR_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+and\s+|\s*[;,&]\s*").unwrap());

impl Evidence {
    pub fn from_filename(parsed: &ParsedFilename) -> Self {
        Self {
            source: EvidenceSource::Filename,
            title: parsed.title_fragment.clone(),
            authors: parsed.authors.clone(),
            year: parsed.year,
        }
    }

    /// PDF info-dictionary evidence. The `Author` field is free text, so it
    /// is split on every common separator; only surnames are compared.
    pub fn from_pdf(meta: &PdfMetadata) -> Self {
        let authors = meta
            .author
            .as_deref()
            .map(|a| {
                RE_METADATA_AUTHOR_SEPARATOR
                    .split(a)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            source: EvidenceSource::Metadata,
            title: meta.title.clone().filter(|t| !t.trim().is_empty()),
            authors,
            year: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_none() && self.authors.is_empty()
    }

    fn similarity_strategy(&self) -> MatchStrategy {
        match self.source {
            EvidenceSource::Filename => MatchStrategy::FilenameSimilarity,
            EvidenceSource::Metadata => MatchStrategy::MetadataSimilarity,
        }
    }
}

/// Everything the matcher knows about one document.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    /// File name without extension.
    pub stem: String,
    pub filename: Evidence,
    pub metadata: Option<Evidence>,
    pub doi: Option<String>,
}

impl MatchQuery {
    pub fn new(stem: &str, parsed: &ParsedFilename, pdf: Option<&PdfMetadata>) -> Self {
        Self {
            stem: stem.to_string(),
            filename: Evidence::from_filename(parsed),
            metadata: pdf.map(Evidence::from_pdf),
            doi: pdf.and_then(|m| m.doi.clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    entry: &'a BibEntry,
    score: f64,
    strategy: MatchStrategy,
}

/// Run the stages in order and return the first conclusive result.
pub fn match_document<'a>(
    query: &MatchQuery,
    store: &'a BibStore,
    thresholds: &MatchThresholds,
    precedence: SourcePrecedence,
) -> MatchResult<'a> {
    let (primary, secondary) = match precedence {
        SourcePrecedence::FilenameFirst => (Some(&query.filename), query.metadata.as_ref()),
        SourcePrecedence::MetadataFirst => (query.metadata.as_ref(), Some(&query.filename)),
    };

    let decided = exact_stage(&query.stem, primary, store)
        .or_else(|| doi_stage(query.doi.as_deref(), store))
        .or_else(|| primary.and_then(|e| similarity_stage(e, store, thresholds.title_similarity)))
        .or_else(|| secondary.and_then(|e| similarity_stage(e, store, thresholds.title_similarity)));

    match decided {
        Some(candidate) => {
            debug!(
                "matched '{}' to {} via {} ({:.3})",
                query.stem, candidate.entry.citation_key, candidate.strategy, candidate.score
            );
            finalize(candidate, thresholds)
        }
        None => {
            debug!("no bibliography match for '{}'", query.stem);
            MatchResult::no_match()
        }
    }
}

fn finalize<'a>(candidate: Candidate<'a>, thresholds: &MatchThresholds) -> MatchResult<'a> {
    let mut reasons = Vec::new();
    if candidate.score < thresholds.low_confidence {
        reasons.push(format!("low confidence ({:.2})", candidate.score));
    }
    if candidate.entry.year.is_none() {
        reasons.push("entry has no year".to_string());
    }
    if candidate.entry.authors.is_empty() && candidate.entry.editors.is_empty() {
        reasons.push("entry has no authors".to_string());
    }
    MatchResult {
        entry: Some(candidate.entry),
        confidence: candidate.score,
        warning: !reasons.is_empty(),
        strategy: Some(candidate.strategy),
        reasons,
    }
}

// ── Stage 1: exact ───────────────────────────────────────────────────────────

fn exact_stage<'a>(stem: &str, primary: Option<&Evidence>, store: &'a BibStore) -> Option<Candidate<'a>> {
    if let Some(entry) = store.lookup(stem.trim()) {
        return Some(Candidate {
            entry,
            score: 1.0,
            strategy: MatchStrategy::CitationKey,
        });
    }

    let evidence = primary?;
    let wanted = normalize_title(evidence.title.as_deref()?);
    if wanted.is_empty() {
        return None;
    }
    store
        .all()
        .iter()
        .filter(|e| normalize_title(&e.title) == wanted)
        .map(|entry| Candidate {
            entry,
            score: 1.0,
            strategy: MatchStrategy::ExactTitle,
        })
        .min_by(rank)
}

// ── Stage 2: DOI ─────────────────────────────────────────────────────────────

fn doi_stage<'a>(doi: Option<&str>, store: &'a BibStore) -> Option<Candidate<'a>> {
    let doi = doi?.trim();
    if doi.is_empty() {
        return None;
    }
    store
        .all()
        .iter()
        .filter(|e| e.doi.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(doi)))
        .map(|entry| Candidate {
            entry,
            score: 1.0,
            strategy: MatchStrategy::Doi,
        })
        .min_by(rank)
}

// ── Stages 3 and 4: similarity + authors + year ──────────────────────────────

fn similarity_stage<'a>(evidence: &Evidence, store: &'a BibStore, threshold: f64) -> Option<Candidate<'a>> {
    if evidence.is_empty() {
        return None;
    }
    let title = normalize_title(evidence.title.as_deref()?);
    if title.is_empty() {
        return None;
    }
    let wanted_surnames = surnames(&evidence.authors);
    if wanted_surnames.is_empty() {
        return None;
    }

    store
        .all()
        .iter()
        .filter_map(|entry| {
            let score = strsim::normalized_levenshtein(&title, &normalize_title(&entry.title));
            if score < threshold {
                return None;
            }
            if let (Some(a), Some(b)) = (evidence.year, entry.year) {
                if a != b {
                    return None;
                }
            }
            // No surnames on either side means nothing to confirm with.
            let entry_surnames = surnames(entry.authors.iter().chain(&entry.editors));
            if wanted_surnames.is_disjoint(&entry_surnames) {
                return None;
            }
            Some(Candidate {
                entry,
                score,
                strategy: evidence.similarity_strategy(),
            })
        })
        .min_by(rank)
}

fn surnames<'s>(names: impl IntoIterator<Item = &'s String>) -> HashSet<String> {
    names.into_iter().filter_map(|n| surname_key(n)).collect()
}

/// Best first: higher score, then more recent year, then smaller key.
fn rank(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.entry.year.cmp(&a.entry.year))
        .then_with(|| a.entry.citation_key.cmp(&b.entry.citation_key))
}

/// Lowercase, accent-free, punctuation replaced by spaces, single-spaced.
pub fn normalize_title(title: &str) -> String {
    fold_diacritics(title)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
