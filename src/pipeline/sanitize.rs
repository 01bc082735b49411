//! Text sanitising: turn extracted highlight text and comments into
//! single-line, printable Unicode.
//!
//! Text under a PDF highlight comes out with the document's line breaks,
//! end-of-line hyphenation, ligature code points, invisible layout
//! characters and, for comments written in some readers, HTML entities.
//! Every renderer wants one clean line, so cleanup happens once here.
//!
//! ## Rule Order
//!
//! Every rule except whitespace collapsing can expose input for another:
//! `&#173;` becomes a soft hyphen that must then be dropped, and rejoining
//! `&am-\np;` across its line break spells a new entity. Those rules run
//! together until the text stops changing. Collapsing whitespace only
//! touches whitespace runs, which no other rule matches inside, so it runs
//! once at the end and [`sanitize`] stays idempotent.

use crate::model::{Annotation, RawAnnotation};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on rule passes; real input settles in two.
const MAX_PASSES: usize = 8;

/// Apply all sanitising rules.
///
/// 1. NFKC-normalise (ligatures, full-width forms)
/// 2. Unescape HTML entities (named and numeric)
/// 3. Remove zero-width characters, soft hyphens, BOM and other controls
/// 4. Re-join words hyphenated across a line break
/// 5. Replace line breaks with spaces
/// 6. Collapse whitespace runs to one space and trim
pub fn sanitize(input: &str) -> String {
    let mut s = input.to_string();
    for _ in 0..MAX_PASSES {
        let next = apply_rules(&s);
        if next == s {
            break;
        }
        s = next;
    }
    collapse_whitespace(&s)
}

/// One pass of rules 1 to 5.
fn apply_rules(input: &str) -> String {
    let s = remove_invisible_chars(&unescape_entities(&nfkc(input)));
    normalise_line_breaks(&join_hyphenated_breaks(&s))
}

/// Sanitise every raw annotation, keeping extraction order.
///
/// Notes that are empty after cleanup become `None`; colours are
/// normalised to lowercase `#rrggbb`.
pub fn sanitize_annotations(raw: &[RawAnnotation]) -> Vec<Annotation> {
    raw.iter()
        .map(|a| Annotation {
            text: sanitize(&a.text),
            page: a.page,
            color: a.color.as_deref().and_then(normalise_color),
            note: a
                .note
                .as_deref()
                .map(sanitize)
                .filter(|n| !n.is_empty()),
        })
        .collect()
}

/// Lowercase `#rrggbb`, or `None` for anything that is not a hex colour.
pub fn normalise_color(color: &str) -> Option<String> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", hex.to_ascii_lowercase()))
    } else {
        None
    }
}

// ── Rule 1: NFKC ─────────────────────────────────────────────────────────────

fn nfkc(input: &str) -> String {
    input.nfkc().collect()
}

// ── Rule 2: HTML entities ────────────────────────────────────────────────────

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,7});").unwrap());

fn unescape_entities(input: &str) -> String {
    RE_ENTITY
        .replace_all(input, |caps: &regex::Captures<'_>| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let c = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "shy" => '\u{00AD}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "hellip" => '\u{2026}',
        _ => return None,
    };
    Some(c.to_string())
}

// ── Rule 3: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            !matches!(
                c,
                '\u{200B}' | '\u{FEFF}' | '\u{00AD}' | '\u{200C}' | '\u{200D}' | '\u{2060}'
            ) && (!c.is_control() || c.is_whitespace())
        })
        .collect()
}

// ── Rule 4: Hyphenation across line breaks ───────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)-[ \t]*\r?\n[ \t]*(\w)").unwrap());

fn join_hyphenated_breaks(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").into_owned()
}

// ── Rule 5: Line breaks ──────────────────────────────────────────────────────

fn normalise_line_breaks(input: &str) -> String {
    input.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

// ── Rule 6: Whitespace ───────────────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ────────────────────────────────────────────────────────────────────
