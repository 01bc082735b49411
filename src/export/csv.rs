//! CSV Renderer: one row per annotation in the seven-column highlight
//! import layout (`Title,Author,Category,Source URL,Highlight,Note,Location`).

use crate::error::HighlightError;
use crate::model::{EnrichedRecord, Meta};
use serde::Serialize;
use std::io::Write;

/// Header row, in column order.
pub const HEADERS: [&str; 7] = [
    "Title",
    "Author",
    "Category",
    "Source URL",
    "Highlight",
    "Note",
    "Location",
];

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Source URL")]
    pub source_url: String,
    #[serde(rename = "Highlight")]
    pub highlight: String,
    #[serde(rename = "Note")]
    pub note: String,
    #[serde(rename = "Location")]
    pub location: String,
}

/// Rows for every annotation, in record order.
pub fn render_rows(record: &EnrichedRecord, category: &str) -> Vec<CsvRow> {
    let title = record.meta.title.clone().unwrap_or_default();
    let author = record.meta.authors.join(", ");
    let source_url = source_url(&record.meta);

    record
        .annotations
        .iter()
        .map(|a| CsvRow {
            title: title.clone(),
            author: author.clone(),
            category: category.to_string(),
            source_url: source_url.clone(),
            highlight: a.text.clone(),
            note: a.note.clone().unwrap_or_default(),
            location: format!("Page {}", a.page),
        })
        .collect()
}

/// DOI resolver URL, else the explicit URL, else empty.
pub fn source_url(meta: &Meta) -> String {
    if let Some(doi) = meta.doi.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        if doi.starts_with("http://") || doi.starts_with("https://") {
            return doi.to_string();
        }
        return format!("https://doi.org/{doi}");
    }
    meta.url.clone().unwrap_or_default()
}

/// Serialise the header and all rows to `writer`.
pub fn write_csv<W: Write>(record: &EnrichedRecord, category: &str, writer: W) -> Result<(), csv::Error> {
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    out.write_record(HEADERS)?;
    for row in render_rows(record, category) {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

/// The whole CSV document as bytes.
pub fn render(record: &EnrichedRecord, category: &str) -> Result<Vec<u8>, HighlightError> {
    let mut buf = Vec::new();
    write_csv(record, category, &mut buf).map_err(|e| HighlightError::Internal(format!("CSV serialisation failed: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Annotation;

    fn record() -> EnrichedRecord {
        EnrichedRecord {
            meta: Meta {
                title: Some("Deep Learning".into()),
                authors: vec!["Yann LeCun".into(), "Yoshua Bengio".into()],
                doi: Some("10.1038/nature14539".into()),
                url: Some("https://example.org/dl".into()),
                ..Meta::default()
            },
            annotations: vec![
                Annotation {
                    text: "representation, \"learning\"".into(),
                    page: 3,
                    color: None,
                    note: Some("key idea".into()),
                },
                Annotation {
                    text: "backprop".into(),
                    page: 12,
                    color: None,
                    note: None,
                },
            ],
        }
    }

    #[test]
    fn test_rows_match_annotations() {
        let rows = render_rows(&record(), "articles");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].location, "Page 3");
        assert_eq!(rows[1].location, "Page 12");
        assert_eq!(rows[0].author, "Yann LeCun, Yoshua Bengio");
        assert_eq!(rows[0].source_url, "https://doi.org/10.1038/nature14539");
        assert_eq!(rows[1].note, "");
    }

    #[test]
    fn test_source_url_preference() {
        let mut meta = record().meta;
        meta.doi = None;
        assert_eq!(source_url(&meta), "https://example.org/dl");
        meta.url = None;
        assert_eq!(source_url(&meta), "");
        meta.doi = Some("https://doi.org/10.1/x".into());
        assert_eq!(source_url(&meta), "https://doi.org/10.1/x");
    }

    #[test]
    fn test_render_quotes_and_header() {
        let out = String::from_utf8(render(&record(), "books").unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("Title,Author,Category,Source URL,Highlight,Note,Location"));
        assert_eq!(
            lines.next(),
            Some(
                "Deep Learning,\"Yann LeCun, Yoshua Bengio\",books,https://doi.org/10.1038/nature14539,\
                 \"representation, \"\"learning\"\"\",key idea,Page 3"
            )
        );
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_empty_record_has_header_only() {
        let empty = EnrichedRecord {
            meta: Meta::default(),
            annotations: vec![],
        };
        let out = String::from_utf8(render(&empty, "articles").unwrap()).unwrap();
        assert_eq!(out, "Title,Author,Category,Source URL,Highlight,Note,Location\n");
    }
}
