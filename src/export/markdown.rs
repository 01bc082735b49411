//! Markdown Renderer: YAML front matter followed by one block per highlight,
//! laid out for a Markdown note vault.
//!
//! ```text
//! ---
//! title: "Attention Is All You Need"
//! year: 2017
//! author-1: "[[Ashish Vaswani]]"
//! citation-key: "vaswani2017"
//! highlights:
//! type: "#article-pdf"
//! aliases:
//!   - "Attention Is All You Need"
//!   - "Attention"
//! ---
//!
//! # Highlights for [[@vaswani2017]]
//!
//! - The dominant sequence transduction models ...
//! > page: `01`
//! > tags: #important-pdf
//!
//! >[!memo]
//! > compare with RNN baselines
//! ```
//!
//! Absent `year`, `citation-key` and `type` are written as bare keys (YAML
//! null) so the key order never changes. The blank line before `>[!memo]`
//! is required by the note application's callout parser.

use crate::config::ColorTagMap;
use crate::export::safe_file_component;
use crate::model::{Annotation, EnrichedRecord};
use std::fmt::Write as _;

/// Render the complete document. Output ends with exactly one newline.
pub fn render(record: &EnrichedRecord, tags: &ColorTagMap) -> String {
    let mut out = front_matter(record);
    out.push('\n');
    match record.meta.citation_key.as_deref() {
        Some(key) => {
            let _ = writeln!(out, "# Highlights for [[@{key}]]");
        }
        None => out.push_str("# Highlights\n"),
    }

    for annotation in &record.annotations {
        out.push('\n');
        out.push_str(&annotation_block(annotation, tags));
    }
    out
}

/// `<key> <type>-pdf.md` when matched, `<key>.md` without a type, else the
/// source document's stem.
pub fn file_name(record: &EnrichedRecord, stem: &str) -> String {
    let base = match (record.meta.citation_key.as_deref(), record.meta.entry_type.as_deref()) {
        (Some(key), Some(kind)) if !kind.is_empty() => format!("{key} {}-pdf", kind.to_lowercase()),
        (Some(key), _) => key.to_string(),
        (None, _) => stem.to_string(),
    };
    format!("{}.md", safe_file_component(&base))
}

// ── Front matter ─────────────────────────────────────────────────────────────

fn front_matter(record: &EnrichedRecord) -> String {
    let meta = &record.meta;
    let mut fm = String::from("---\n");

    let title = meta.title.as_deref().unwrap_or("");
    let _ = writeln!(fm, "title: \"{}\"", yaml_escape(title));
    match meta.year {
        Some(year) => {
            let _ = writeln!(fm, "year: {year}");
        }
        None => fm.push_str("year:\n"),
    }
    for (i, name) in meta.authors.iter().enumerate() {
        let _ = writeln!(fm, "author-{}: \"[[{}]]\"", i + 1, yaml_escape(name));
    }
    for (i, name) in meta.editors.iter().enumerate() {
        let _ = writeln!(fm, "editor-{}: \"[[{}]]\"", i + 1, yaml_escape(name));
    }
    match meta.citation_key.as_deref() {
        Some(key) => {
            let _ = writeln!(fm, "citation-key: \"{}\"", yaml_escape(key));
        }
        None => fm.push_str("citation-key:\n"),
    }
    fm.push_str("highlights:\n");
    match meta.entry_type.as_deref().filter(|t| !t.is_empty()) {
        Some(kind) => {
            let _ = writeln!(fm, "type: \"#{}-pdf\"", yaml_escape(&kind.to_lowercase()));
        }
        None => fm.push_str("type:\n"),
    }

    let aliases = aliases(title, meta.short_title.as_deref());
    if aliases.is_empty() {
        fm.push_str("aliases: []\n");
    } else {
        fm.push_str("aliases:\n");
        for alias in aliases {
            let _ = writeln!(fm, "  - \"{}\"", yaml_escape(&alias));
        }
    }
    fm.push_str("---\n");
    fm
}

/// Full title plus a short title, deduplicated, empties dropped.
fn aliases(title: &str, short_title: Option<&str>) -> Vec<String> {
    let mut aliases: Vec<String> = Vec::new();
    let title = title.trim();
    if !title.is_empty() {
        aliases.push(title.to_string());
    }
    let short = short_title
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| derive_short_title(title));
    if let Some(short) = short {
        if !aliases.contains(&short) {
            aliases.push(short);
        }
    }
    aliases
}

/// Text before the first ` - `, en dash, em dash or colon.
///
/// Hyphens inside words (`Self-Attention`) do not split.
pub fn derive_short_title(title: &str) -> Option<String> {
    let cut = [" - ", "\u{2013}", "\u{2014}", ":"]
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()?;
    let short = title[..cut].trim();
    (!short.is_empty() && short != title.trim()).then(|| short.to_string())
}

/// Escape for a double-quoted YAML scalar.
fn yaml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || matches!(c, '\u{FFFE}' | '\u{FFFF}') => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

// ── Highlight blocks ─────────────────────────────────────────────────────────

fn annotation_block(annotation: &Annotation, tags: &ColorTagMap) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "- {}", annotation.text);
    let _ = writeln!(block, "> page: `{:02}`", annotation.page);
    if let Some(tag) = annotation.color.as_deref().and_then(|c| tags.tag_for(c)) {
        let _ = writeln!(block, "> tags: #{tag}");
    }
    if let Some(note) = memo_text(annotation) {
        block.push_str("\n>[!memo]\n");
        for line in note.lines() {
            let _ = writeln!(block, "> {}", line.trim_end());
        }
    }
    block
}

/// The note, unless it is empty or repeats the highlight text.
fn memo_text(annotation: &Annotation) -> Option<&str> {
    let note = annotation.note.as_deref()?.trim();
    if note.is_empty() || collapse(note) == collapse(&annotation.text) {
        None
    } else {
        Some(note)
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
