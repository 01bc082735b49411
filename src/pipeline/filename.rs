//! Best-effort bibliographic hints from a PDF's file name.
//!
//! Libraries named by a reference manager follow a `Title_Authors_Year`
//! schema, e.g. `Attention Is All You Need_Vaswani and Shazeer_2017.pdf`.
//! Anything that does not fit yields an empty [`ParsedFilename`]; the
//! matcher and assembler treat every field as optional.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fields recovered from a file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFilename {
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub title_fragment: Option<String>,
}

impl ParsedFilename {
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty() && self.year.is_none() && self.title_fragment.is_none()
    }
}

static RE_AUTHOR_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:and|&)\s+|\s*[;&]\s*").unwrap());

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(1[5-9]\d\d|2\d\d\d)[a-z]?$").unwrap());

/// Parse `file_name` (no directory) against `Title<d>Authors<d>Year`.
///
/// The last segment is the year and the one before it the authors; all
/// earlier segments form the title, so titles may contain the delimiter.
/// A year segment that is not a plausible year leaves `year` absent.
pub fn parse_filename(file_name: &str, delimiter: &str) -> ParsedFilename {
    if delimiter.is_empty() {
        return ParsedFilename::default();
    }
    let stem = file_stem(file_name);
    let segments: Vec<&str> = stem.split(delimiter).collect();
    if segments.len() < 3 {
        return ParsedFilename::default();
    }

    let n = segments.len();
    let title = segments[..n - 2].join(delimiter);
    let title = title.trim();
    let authors = split_authors(segments[n - 2]);
    let year = RE_YEAR
        .captures(segments[n - 1].trim())
        .and_then(|c| c[1].parse::<i32>().ok());

    ParsedFilename {
        authors,
        year,
        title_fragment: (!title.is_empty()).then(|| title.to_string()),
    }
}

/// The file name without its final extension.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains(' ') && ext.len() <= 5 => stem,
        _ => file_name,
    }
}

fn split_authors(segment: &str) -> Vec<String> {
    RE_AUTHOR_SEPARATOR
        .split(segment)
        .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|a| !a.is_empty())
        .collect()
}
