//! Bibliographic Store: a BibTeX file loaded into an immutable table keyed
//! by citation key.
//!
//! ## Loading
//!
//! The file is first scanned for entry boundaries (`@type{` at the start of
//! a line, closed by its balancing brace). The scan decides what is fatal:
//! an entry still open at end of file, or two entries with the same key,
//! makes the whole bibliography unusable ([`BibParseError`]). Each entry is
//! then parsed on its own with `biblatex`, so one malformed entry only
//! costs that entry: it is logged, recorded as a [`SkippedEntry`] and the
//! load continues.
//!
//! `@string` macros are collected in file order and made visible to every
//! later entry; `@comment` and `@preamble` are ignored.
//!
//! ## Sharing
//!
//! A [`BibStore`] has no interior mutability. Batch runs share one through
//! `Arc<BibStore>` without locking.

use crate::error::{BibParseError, HighlightError, SkippedEntry};
use crate::pipeline::names::{decode_latex, normalize_names};
use crate::pipeline::sanitize::sanitize;
use biblatex::{Bibliography, Chunk, Spanned};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// One usable bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibEntry {
    pub citation_key: String,
    /// Lowercase BibTeX entry type, e.g. `article`.
    pub entry_type: String,
    pub title: String,
    pub short_title: Option<String>,
    pub year: Option<i32>,
    /// Canonical `First Last` names, in field order.
    pub authors: Vec<String>,
    pub editors: Vec<String>,
    /// Bare DOI (`10.xxxx/...`) without resolver prefix.
    pub doi: Option<String>,
    pub url: Option<String>,
}

/// Read-only table of [`BibEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct BibStore {
    /// File order.
    entries: Vec<BibEntry>,
    index: HashMap<String, usize>,
    skipped: Vec<SkippedEntry>,
}

impl BibStore {
    /// Read and parse a bibliography file.
    pub fn load(path: &Path) -> Result<Self, HighlightError> {
        let content = std::fs::read_to_string(path).map_err(|source| HighlightError::BibRead {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(&content)?;
        info!(
            "Loaded {} bibliography entries from {} ({} skipped)",
            store.len(),
            path.display(),
            store.skipped.len()
        );
        Ok(store)
    }

    /// Parse bibliography source text.
    pub fn parse(content: &str) -> Result<Self, BibParseError> {
        let raw_entries = scan_entries(content)?;

        let mut store = BibStore::default();
        let mut strings = String::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut data_entries = 0usize;

        for raw in raw_entries {
            let text = match raw.text {
                Ok(text) => text,
                Err(reason) => {
                    if raw.kind != "comment" {
                        store.skip(raw.line, None, reason);
                    }
                    continue;
                }
            };
            match raw.kind.as_str() {
                "comment" | "preamble" => continue,
                "string" => {
                    strings.push_str(text);
                    strings.push('\n');
                    continue;
                }
                _ => data_entries += 1,
            }

            let Some(key) = read_key(text) else {
                store.skip(raw.line, None, "missing citation key".to_string());
                continue;
            };
            if let Some(&first_line) = seen.get(&key) {
                return Err(BibParseError::DuplicateKey {
                    key,
                    first_line,
                    line: raw.line,
                });
            }
            seen.insert(key.clone(), raw.line);

            match build_entry(&strings, text, &key, &raw.kind) {
                Ok(entry) => {
                    store.index.insert(entry.citation_key.clone(), store.entries.len());
                    store.entries.push(entry);
                }
                Err(reason) => store.skip(raw.line, Some(key), reason),
            }
        }

        if data_entries == 0 {
            return Err(BibParseError::NoEntries);
        }
        debug!("bibliography parsed: {} entries, {} skipped", store.len(), store.skipped.len());
        Ok(store)
    }

    /// Entry with exactly this citation key.
    pub fn lookup(&self, key: &str) -> Option<&BibEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Every entry, in file order.
    pub fn all(&self) -> &[BibEntry] {
        &self.entries
    }

    /// Entries left out during the load.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a store from already-resolved entries.
    ///
    /// Later entries with a key already present are ignored.
    pub fn from_entries(entries: impl IntoIterator<Item = BibEntry>) -> Self {
        let mut store = BibStore::default();
        for entry in entries {
            if store.index.contains_key(&entry.citation_key) {
                continue;
            }
            store.index.insert(entry.citation_key.clone(), store.entries.len());
            store.entries.push(entry);
        }
        store
    }

    fn skip(&mut self, line: usize, key: Option<String>, reason: String) {
        let entry = SkippedEntry { line, key, reason };
        warn!("Skipping bibliography entry at {entry}");
        self.skipped.push(entry);
    }
}

// ── Scanning ─────────────────────────────────────────────────────────────────

static RE_ENTRY_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*@").unwrap());

static RE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*@[ \t]*([A-Za-z]+)[ \t\r\n]*([{(])").unwrap());

static RE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r##"^\s*([^,\s{}()="#]+)\s*(?:,|$)"##).unwrap());

struct RawEntry<'a> {
    /// 1-indexed line of the `@`.
    line: usize,
    kind: String,
    /// Entry source through its closing delimiter, or why it is unusable.
    text: Result<&'a str, String>,
}

fn scan_entries(content: &str) -> Result<Vec<RawEntry<'_>>, BibParseError> {
    let starts: Vec<usize> = RE_ENTRY_START.find_iter(content).map(|m| m.start()).collect();
    let mut entries = Vec::with_capacity(starts.len());

    for (i, &start) in starts.iter().enumerate() {
        let is_last = i + 1 == starts.len();
        let end = starts.get(i + 1).copied().unwrap_or(content.len());
        let chunk = &content[start..end];
        let line = line_of(content, start);

        let Some(header) = RE_HEADER.captures(chunk) else {
            entries.push(RawEntry {
                line,
                kind: String::new(),
                text: Err("malformed entry header".to_string()),
            });
            continue;
        };
        let kind = header[1].to_ascii_lowercase();
        let open = header.get(2).map_or(0, |m| m.start());
        let open_char = if &header[2] == "(" { '(' } else { '{' };

        let text = match closing_offset(&chunk[open..], open_char) {
            Some(close) => Ok(&chunk[..open + close + 1]),
            None if kind == "comment" => Err("unterminated comment".to_string()),
            None if is_last => return Err(BibParseError::Unterminated { line }),
            None => Err("unbalanced braces".to_string()),
        };
        entries.push(RawEntry { line, kind, text });
    }
    Ok(entries)
}

/// Byte offset of the delimiter closing `s[0]`.
fn closing_offset(s: &str, open_char: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && open_char == '{' {
                    return Some(i);
                }
            }
            ')' if open_char == '(' && depth == 0 && i > 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn line_of(content: &str, byte_offset: usize) -> usize {
    content[..byte_offset].matches('\n').count() + 1
}

/// `@type( ... )` rewritten as `@type{ ... }`.
fn brace_delimited(entry_text: &str) -> std::borrow::Cow<'_, str> {
    match entry_text.find(['{', '(']) {
        Some(open) if entry_text[open..].starts_with('(') && entry_text.ends_with(')') => {
            let inner = &entry_text[open + 1..entry_text.len() - 1];
            format!("{}{{{inner}}}", &entry_text[..open]).into()
        }
        _ => entry_text.into(),
    }
}

fn read_key(entry_text: &str) -> Option<String> {
    let open = entry_text.find(['{', '('])?;
    let body = &entry_text[open + 1..entry_text.len().saturating_sub(1)];
    RE_KEY.captures(body).map(|c| c[1].to_string())
}

// ── Field extraction ─────────────────────────────────────────────────────────

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());

fn build_entry(strings: &str, text: &str, key: &str, kind: &str) -> Result<BibEntry, String> {
    let source = format!("{strings}{}", brace_delimited(text));
    let bibliography = Bibliography::parse(&source).map_err(|e| format!("could not be parsed: {e}"))?;
    let entry = bibliography
        .get(key)
        .ok_or_else(|| "could not be parsed".to_string())?;

    let title = field_text(entry.get("title")).ok_or_else(|| "missing title".to_string())?;

    let year = field_raw(entry.get("year"))
        .or_else(|| field_raw(entry.get("date")))
        .and_then(|raw| RE_YEAR.find(&raw).and_then(|m| m.as_str().parse::<i32>().ok()));

    Ok(BibEntry {
        citation_key: key.to_string(),
        entry_type: kind.to_string(),
        title,
        short_title: field_text(entry.get("shorttitle")),
        year,
        authors: field_raw(entry.get("author"))
            .map(|raw| normalize_names(&raw))
            .unwrap_or_default(),
        editors: field_raw(entry.get("editor"))
            .map(|raw| normalize_names(&raw))
            .unwrap_or_default(),
        doi: field_plain(entry.get("doi")).and_then(|raw| bare_doi(&raw)),
        url: field_plain(entry.get("url"))
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty()),
    })
}

/// Field source with brace groups restored, ready for name splitting.
fn field_raw(chunks: Option<&[Spanned<Chunk>]>) -> Option<String> {
    let raw: String = chunks?
        .iter()
        .map(|c| match &c.v {
            Chunk::Normal(s) => s.clone(),
            Chunk::Verbatim(s) => format!("{{{s}}}"),
            Chunk::Math(s) => format!("${s}$"),
        })
        .collect();
    (!raw.trim().is_empty()).then_some(raw)
}

/// Field contents as written, for verbatim fields such as `doi` and `url`.
fn field_plain(chunks: Option<&[Spanned<Chunk>]>) -> Option<String> {
    let raw: String = chunks?
        .iter()
        .map(|c| match &c.v {
            Chunk::Normal(s) | Chunk::Verbatim(s) | Chunk::Math(s) => s.as_str(),
        })
        .collect();
    (!raw.trim().is_empty()).then_some(raw)
}

/// Display text: LaTeX decoded, braces dropped, single line.
fn field_text(chunks: Option<&[Spanned<Chunk>]>) -> Option<String> {
    let text = sanitize(&decode_latex(&field_raw(chunks)?));
    (!text.is_empty()).then_some(text)
}

/// Strip resolver prefixes: `https://doi.org/10.1/x` → `10.1/x`.
pub fn bare_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let prefix_len = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"]
        .iter()
        .find(|p| lower.starts_with(*p))
        .map_or(0, |p| p.len());
    let doi = trimmed[prefix_len..].trim();
    (!doi.is_empty()).then(|| doi.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"
@comment{jabref-meta: databaseType:bibtex;}

@string{nips = "Advances in Neural Information Processing Systems"}

@article{vaswani2017,
  title     = {Attention Is All You Need},
  shorttitle = {Attention},
  author    = {Vaswani, Ashish and Shazeer, Noam
               and Parmar, Niki},
  year      = {2017},
  doi       = {https://doi.org/10.48550/arXiv.1706.03762},
  booktitle = nips,
}

@book{needy2020,
  title  = {Handbook of {Research}: Methods},
  editor = {{LaScola Needy}, Karen},
  date   = {2020-05-01},
  url    = {https://example.org/handbook},
}

@misc{notitle,
  author = {Nobody, Ann},
  year   = {1999},
}
"#;

    #[test]
    fn test_parse_library() {
        let store = BibStore::parse(LIBRARY).unwrap();
        assert_eq!(store.len(), 2);

        let v = store.lookup("vaswani2017").unwrap();
        assert_eq!(v.entry_type, "article");
        assert_eq!(v.title, "Attention Is All You Need");
        assert_eq!(v.short_title.as_deref(), Some("Attention"));
        assert_eq!(v.year, Some(2017));
        assert_eq!(v.authors, vec!["Ashish Vaswani", "Noam Shazeer", "Niki Parmar"]);
        assert_eq!(v.doi.as_deref(), Some("10.48550/arXiv.1706.03762"));

        let n = store.lookup("needy2020").unwrap();
        assert_eq!(n.title, "Handbook of Research: Methods");
        assert_eq!(n.year, Some(2020));
        assert!(n.authors.is_empty());
        assert_eq!(n.editors, vec!["Karen LaScola Needy"]);
        assert_eq!(n.url.as_deref(), Some("https://example.org/handbook"));
    }

    #[test]
    fn test_entry_without_title_is_skipped() {
        let store = BibStore::parse(LIBRARY).unwrap();
        assert!(store.lookup("notitle").is_none());
        let skipped = store.skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].key.as_deref(), Some("notitle"));
        assert_eq!(skipped[0].reason, "missing title");
    }

    #[test]
    fn test_all_keeps_file_order() {
        let store = BibStore::parse(LIBRARY).unwrap();
        let keys: Vec<&str> = store.all().iter().map(|e| e.citation_key.as_str()).collect();
        assert_eq!(keys, vec!["vaswani2017", "needy2020"]);
    }

    #[test]
    fn test_duplicate_key_is_fatal() {
        let src = "@article{a,\n title={One}}\n\n@article{a,\n title={Two}}\n";
        assert_eq!(
            BibStore::parse(src).unwrap_err(),
            BibParseError::DuplicateKey {
                key: "a".into(),
                first_line: 1,
                line: 4
            }
        );
    }

    #[test]
    fn test_unterminated_last_entry_is_fatal() {
        let src = "@article{a,\n title={One}}\n@article{b,\n title={Two}\n";
        assert_eq!(
            BibStore::parse(src).unwrap_err(),
            BibParseError::Unterminated { line: 3 }
        );
    }

    #[test]
    fn test_unbalanced_middle_entry_is_skipped() {
        let src = "@article{a,\n title={One\n}\n@article{b,\n title={Two}}\n";
        let store = BibStore::parse(src).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.lookup("b").is_some());
        assert_eq!(store.skipped()[0].reason, "unbalanced braces");
        assert_eq!(store.skipped()[0].line, 1);
    }

    #[test]
    fn test_missing_key_is_skipped() {
        let src = "@article{title={No key}}\n@article{ok,\n title={Fine}}\n";
        let store = BibStore::parse(src).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.skipped()[0].reason, "missing citation key");
    }

    #[test]
    fn test_no_entries() {
        assert_eq!(BibStore::parse("just text\n").unwrap_err(), BibParseError::NoEntries);
        assert_eq!(
            BibStore::parse("@comment{nothing here}").unwrap_err(),
            BibParseError::NoEntries
        );
    }

    #[test]
    fn test_paren_delimited_entry() {
        let store = BibStore::parse("@article(p1,\n title = {Parens (and more)},\n year = 2001)\n").unwrap();
        let e = store.lookup("p1").unwrap();
        assert_eq!(e.title, "Parens (and more)");
        assert_eq!(e.year, Some(2001));
    }

    #[test]
    fn test_bare_doi() {
        assert_eq!(bare_doi("doi:10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(bare_doi("http://dx.doi.org/10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(bare_doi(" 10.1/x ").as_deref(), Some("10.1/x"));
        assert_eq!(bare_doi("https://doi.org/"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = BibStore::load(Path::new("/definitely/not/here.bib")).unwrap_err();
        assert!(matches!(err, HighlightError::BibRead { .. }));
    }
}
