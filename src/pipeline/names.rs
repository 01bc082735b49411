//! Author/editor name normalisation for BibTeX person fields.
//!
//! A BibTeX `author` field is a list of names joined by the word `and`,
//! each either `Last, First`, `Last, Jr, First` or free-form `First Last`.
//! Braces protect groups (`{Barnes and Noble}`, `{LaScola Needy}, Karen`)
//! and accents arrive as LaTeX macros (`J{\'e}gou`). The output is a list of
//! `First Last` strings in input order.
//!
//! A segment without a top-level comma is emitted as written: guessing where
//! a free-form surname starts mis-splits prefixes and compound surnames more
//! often than it helps.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Split a raw person field into canonical `First Last` names.
///
/// Order is preserved and duplicates are kept. The BibTeX placeholder
/// `others` (as in `and others`) is dropped.
pub fn normalize_names(raw: &str) -> Vec<String> {
    split_top_level_and(raw)
        .iter()
        .filter_map(|segment| canonical_name(segment))
        .collect()
}

/// Lowercase, accent-free surname used for author overlap checks.
///
/// Takes the last word of a `First Last` name, skipping generational
/// suffixes and trailing initials, so `Hervé Jégou`, `Smith J` and a file
/// name's `Jegou` or `Smith` key on the surname.
pub fn surname_key(name: &str) -> Option<String> {
    let words: Vec<&str> = name.split_whitespace().collect();
    let last = words
        .iter()
        .rev()
        .find(|w| !is_suffix(w) && !is_initial(w))
        .or_else(|| words.last())?;
    let key: String = fold_diacritics(last)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    (!key.is_empty()).then_some(key)
}

/// Strip accents: `Jégou` → `Jegou`.
pub fn fold_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_suffix(word: &str) -> bool {
    matches!(
        word.trim_end_matches(['.', ',']).to_ascii_lowercase().as_str(),
        "jr" | "sr" | "ii" | "iii" | "iv"
    )
}

/// `J`, `J.`, `J.R.` or `J.-P.`: every letter group is a single letter.
fn is_initial(word: &str) -> bool {
    let mut groups = word
        .split(['.', '-'])
        .filter(|g| !g.is_empty())
        .peekable();
    groups.peek().is_some() && groups.all(|g| g.chars().count() == 1)
}

// ── Splitting ────────────────────────────────────────────────────────────────

/// Whitespace-separated tokens at brace depth 0; braced groups stay whole.
fn top_level_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '{' => {
                depth += 1;
                buf.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                buf.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
            }
            c => buf.push(c),
        }
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }
    tokens
}

fn split_top_level_and(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for token in top_level_tokens(raw) {
        if token.eq_ignore_ascii_case("and") {
            segments.push(current.join(" "));
            current.clear();
        } else {
            current.push(token);
        }
    }
    segments.push(current.join(" "));
    segments
}

fn split_top_level_commas(segment: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in segment.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&segment[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&segment[start..]);
    parts
}

fn canonical_name(segment: &str) -> Option<String> {
    let parts: Vec<String> = split_top_level_commas(segment)
        .into_iter()
        .map(clean_part)
        .collect();

    let name = match parts.as_slice() {
        [whole] => whole.clone(),
        [last, first] if !last.is_empty() => join_words(&[&space_initials(first), last]),
        [last, suffix, first] if !last.is_empty() => {
            join_words(&[&space_initials(first), last, suffix])
        }
        _ => clean_part(segment),
    };

    if name.is_empty() || name.eq_ignore_ascii_case("others") {
        None
    } else {
        Some(name)
    }
}

fn clean_part(part: &str) -> String {
    decode_latex(part)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_words(words: &[&str]) -> String {
    words
        .iter()
        .filter(|w| !w.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

static RE_TIGHT_INITIALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\p{Lu})").unwrap());

/// `J.K.` → `J. K.`
fn space_initials(given: &str) -> String {
    RE_TIGHT_INITIALS.replace_all(given, ". $1").into_owned()
}

// ── LaTeX decoding ───────────────────────────────────────────────────────────

static RE_SYMBOL_ACCENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\\(['`^"~=.])\s*(?:\{\s*(\\[ij]|[A-Za-z])\s*\}|(\\[ij]|[A-Za-z]))"#).unwrap()
});

static RE_LETTER_ACCENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\([cvuHkrdb])(?:\s*\{\s*(\\[ij]|[A-Za-z])\s*\}|\s+([A-Za-z]))").unwrap()
});

static RE_SPECIAL_LETTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(ss|aa|AA|ae|AE|oe|OE|o|O|l|L|i|j)(?:\{\}|\s+|\b)").unwrap()
});

static RE_ESCAPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([&%$#_])").unwrap());

static RE_UNKNOWN_COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[A-Za-z]+\*?\s*").unwrap());

/// Decode LaTeX accent macros and escapes into plain Unicode and drop
/// grouping braces: `J{\'e}gou` → `Jégou`, `{\"U}ber` → `Über`.
///
/// Unknown commands such as `\textit` are removed and their argument kept.
pub fn decode_latex(input: &str) -> String {
    if !input.contains(['\\', '{', '}', '~']) {
        return input.to_string();
    }
    let s = RE_SYMBOL_ACCENT.replace_all(input, |caps: &Captures<'_>| {
        let base = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        compose(base, symbol_mark(&caps[1]))
    });
    let s = RE_LETTER_ACCENT.replace_all(&s, |caps: &Captures<'_>| {
        let base = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        compose(base, letter_mark(&caps[1]))
    });
    let s = RE_SPECIAL_LETTER.replace_all(&s, |caps: &Captures<'_>| special_letter(&caps[1]).to_string());
    let s = RE_ESCAPED.replace_all(&s, "$1");
    let s = RE_UNKNOWN_COMMAND.replace_all(&s, "");
    s.chars()
        .filter(|c| *c != '{' && *c != '}')
        .map(|c| if c == '~' { ' ' } else { c })
        .collect()
}

fn compose(base: &str, mark: Option<char>) -> String {
    // An accented dotless i/j is written as a plain i/j.
    let base = match base {
        "\\i" => "i",
        "\\j" => "j",
        other => other,
    };
    match mark {
        Some(mark) => format!("{base}{mark}").nfc().collect(),
        None => base.to_string(),
    }
}

fn symbol_mark(cmd: &str) -> Option<char> {
    Some(match cmd {
        "'" => '\u{0301}',
        "`" => '\u{0300}',
        "^" => '\u{0302}',
        "\"" => '\u{0308}',
        "~" => '\u{0303}',
        "=" => '\u{0304}',
        "." => '\u{0307}',
        _ => return None,
    })
}

fn letter_mark(cmd: &str) -> Option<char> {
    Some(match cmd {
        "c" => '\u{0327}',
        "v" => '\u{030C}',
        "u" => '\u{0306}',
        "H" => '\u{030B}',
        "k" => '\u{0328}',
        "r" => '\u{030A}',
        "d" => '\u{0323}',
        "b" => '\u{0331}',
        _ => return None,
    })
}

fn special_letter(cmd: &str) -> &'static str {
    match cmd {
        "ss" => "ß",
        "aa" => "å",
        "AA" => "Å",
        "ae" => "æ",
        "AE" => "Æ",
        "oe" => "œ",
        "OE" => "Œ",
        "o" => "ø",
        "O" => "Ø",
        "l" => "ł",
        "L" => "Ł",
        "i" => "ı",
        "j" => "ȷ",
        _ => "",
    }
}
