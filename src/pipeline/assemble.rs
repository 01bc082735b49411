//! Record Assembler: merge sanitised annotations with resolved metadata.
//!
//! A matched entry is authoritative: fields it lacks stay absent and are
//! never backfilled from the file name. Without a match the record is built
//! from what the document itself offers, with the title falling back from
//! embedded PDF metadata to the file name.

use crate::model::{Annotation, EnrichedRecord, Meta, PdfMetadata};
use crate::pipeline::filename::ParsedFilename;
use crate::pipeline::matcher::MatchResult;
use crate::pipeline::sanitize::sanitize;
use once_cell::sync::Lazy;
use regex::Regex;

/// Build the enriched record for one document.
///
/// `stem` is the file name without extension and `delimiter` the file-name
/// field delimiter; together they give the last-resort title.
pub fn assemble(
    annotations: Vec<Annotation>,
    parsed: &ParsedFilename,
    matched: &MatchResult<'_>,
    pdf: Option<&PdfMetadata>,
    stem: &str,
    delimiter: &str,
) -> EnrichedRecord {
    let meta = match matched.entry {
        Some(entry) => Meta {
            title: Some(entry.title.clone()),
            short_title: entry.short_title.clone(),
            year: entry.year,
            entry_type: Some(entry.entry_type.clone()),
            citation_key: Some(entry.citation_key.clone()),
            authors: entry.authors.clone(),
            editors: entry.editors.clone(),
            doi: entry.doi.clone(),
            url: entry.url.clone(),
        },
        None => Meta {
            title: Some(fallback_title(parsed, pdf, stem, delimiter)),
            short_title: None,
            year: parsed.year,
            entry_type: None,
            citation_key: None,
            authors: fallback_authors(parsed, pdf),
            editors: Vec::new(),
            doi: pdf.and_then(|m| m.doi.clone()),
            url: None,
        },
    };
    EnrichedRecord { meta, annotations }
}

fn fallback_title(parsed: &ParsedFilename, pdf: Option<&PdfMetadata>, stem: &str, delimiter: &str) -> String {
    pdf.and_then(|m| m.title.as_deref())
        .map(sanitize)
        .filter(|t| !t.is_empty())
        .or_else(|| parsed.title_fragment.clone())
        .unwrap_or_else(|| {
            let spaced = if delimiter.is_empty() {
                stem.to_string()
            } else {
                stem.replace(delimiter, " ")
            };
            sanitize(&spaced)
        })
}

static RE_PDF_AUTHOR_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*;\s*|\s+and\s+").unwrap());

fn fallback_authors(parsed: &ParsedFilename, pdf: Option<&PdfMetadata>) -> Vec<String> {
    if !parsed.authors.is_empty() {
        return parsed.authors.clone();
    }
    pdf.and_then(|m| m.author.as_deref())
        .map(|a| {
            RE_PDF_AUTHOR_SEPARATOR
                .split(a)
                .map(sanitize)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::BibEntry;
    use crate::pipeline::matcher::MatchStrategy;

    fn annotations() -> Vec<Annotation> {
        vec![
            Annotation {
                text: "second page".into(),
                page: 2,
                color: None,
                note: None,
            },
            Annotation {
                text: "first page".into(),
                page: 1,
                color: None,
                note: None,
            },
        ]
    }

    fn unmatched() -> MatchResult<'static> {
        MatchResult {
            entry: None,
            confidence: 0.0,
            warning: true,
            strategy: None,
            reasons: vec![],
        }
    }

    #[test]
    fn test_matched_entry_is_authoritative() {
        let entry = BibEntry {
            citation_key: "doe2019".into(),
            entry_type: "book".into(),
            title: "A Book".into(),
            short_title: None,
            year: None,
            authors: vec!["Jane Doe".into()],
            editors: vec![],
            doi: None,
            url: Some("https://example.org".into()),
        };
        let matched = MatchResult {
            entry: Some(&entry),
            confidence: 1.0,
            warning: true,
            strategy: Some(MatchStrategy::ExactTitle),
            reasons: vec![],
        };
        let parsed = ParsedFilename {
            authors: vec!["Doe".into()],
            year: Some(2019),
            title_fragment: Some("A Book".into()),
        };
        let r = assemble(annotations(), &parsed, &matched, None, "A Book_Doe_2019", "_");
        assert_eq!(r.meta.citation_key.as_deref(), Some("doe2019"));
        assert_eq!(r.meta.year, None, "missing year must not be backfilled");
        assert_eq!(r.meta.authors, vec!["Jane Doe"]);
        assert_eq!(r.meta.entry_type.as_deref(), Some("book"));
    }

    #[test]
    fn test_annotation_order_preserved() {
        let r = assemble(annotations(), &ParsedFilename::default(), &unmatched(), None, "x", "_");
        let pages: Vec<u32> = r.annotations.iter().map(|a| a.page).collect();
        assert_eq!(pages, vec![2, 1]);
    }

    #[test]
    fn test_unmatched_prefers_pdf_title() {
        let pdf = PdfMetadata {
            title: Some("  Embedded\nTitle ".into()),
            author: Some("Ann One; Bob Two".into()),
            ..PdfMetadata::default()
        };
        let parsed = ParsedFilename {
            authors: vec![],
            year: Some(2001),
            title_fragment: Some("From File".into()),
        };
        let r = assemble(vec![], &parsed, &unmatched(), Some(&pdf), "From File__2001", "_");
        assert_eq!(r.meta.title.as_deref(), Some("Embedded Title"));
        assert_eq!(r.meta.citation_key, None);
        assert_eq!(r.meta.year, Some(2001));
        assert_eq!(r.meta.authors, vec!["Ann One", "Bob Two"]);
    }

    #[test]
    fn test_unmatched_title_from_filename_then_stem() {
        let parsed = ParsedFilename {
            authors: vec!["Roe".into()],
            year: None,
            title_fragment: Some("From File".into()),
        };
        let r = assemble(vec![], &parsed, &unmatched(), None, "From File_Roe_x", "_");
        assert_eq!(r.meta.title.as_deref(), Some("From File"));
        assert_eq!(r.meta.authors, vec!["Roe"]);

        let r = assemble(vec![], &ParsedFilename::default(), &unmatched(), None, "scan_0001", "_");
        assert_eq!(r.meta.title.as_deref(), Some("scan 0001"));
    }

    #[test]
    fn test_deterministic() {
        let a = assemble(annotations(), &ParsedFilename::default(), &unmatched(), None, "x", "_");
        let b = assemble(annotations(), &ParsedFilename::default(), &unmatched(), None, "x", "_");
        assert_eq!(a, b);
    }
}
