//! Enriched JSON: the serialised [`EnrichedRecord`], indented by four spaces.
//!
//! Non-ASCII text is written as UTF-8, never as `\uXXXX` escapes, so the
//! file stays readable and diffs cleanly.

use crate::error::HighlightError;
use crate::model::EnrichedRecord;
use serde::Serialize;

/// Pretty-printed JSON with a trailing newline.
pub fn render(record: &EnrichedRecord) -> Result<Vec<u8>, HighlightError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record
        .serialize(&mut ser)
        .map_err(|e| HighlightError::Internal(format!("JSON serialisation failed: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}
