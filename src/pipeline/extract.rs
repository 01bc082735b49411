//! Highlight extraction via pdfium: annotations plus the document info
//! dictionary.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async tasks. The async entry point
//! moves the work onto tokio's blocking pool; the batch driver calls the
//! blocking variant from inside its own blocking task.
//!
//! ## Highlight text
//!
//! The text under a highlight is taken from the characters its quad points
//! cover (`PdfPageText::for_annotation`), not from the annotation's own
//! contents, which hold the reader's comment instead.

use crate::error::HighlightError;
use crate::model::{PdfMetadata, RawAnnotation};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything read from one PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Page order, then annotation order within each page.
    pub annotations: Vec<RawAnnotation>,
    pub metadata: PdfMetadata,
}

/// Extract highlights and metadata on tokio's blocking pool.
pub async fn extract_document(pdf_path: &Path, password: Option<&str>) -> Result<ExtractedDocument, HighlightError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_document_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| HighlightError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract_document`].
pub fn extract_document_blocking(pdf_path: &Path, password: Option<&str>) -> Result<ExtractedDocument, HighlightError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let mut annotations = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index as u32 + 1;
        let text = page.text().ok();

        for annotation in page.annotations().iter() {
            if annotation.annotation_type() != PdfPageAnnotationType::Highlight {
                continue;
            }
            let highlighted = text
                .as_ref()
                .and_then(|t| t.for_annotation(&annotation).ok())
                .unwrap_or_default();
            let color = annotation
                .stroke_color()
                .or_else(|_| annotation.fill_color())
                .ok()
                .map(|c| format!("#{:02x}{:02x}{:02x}", c.red(), c.green(), c.blue()));

            annotations.push(RawAnnotation {
                text: highlighted,
                page: page_number,
                color,
                note: annotation.contents().filter(|c| !c.trim().is_empty()),
            });
        }
    }

    let metadata = read_metadata(&document);
    info!(
        "Extracted {} highlights from {} ({} pages)",
        annotations.len(),
        pdf_path.display(),
        metadata.page_count
    );
    Ok(ExtractedDocument { annotations, metadata })
}

/// Bind to `PDFIUM_LIB_PATH` (a library file or its directory) when set,
/// else to the system library.
pub fn bind_pdfium() -> Result<Pdfium, HighlightError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(raw) => {
            let path = PathBuf::from(raw);
            let library = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", library.display());
            Pdfium::bind_to_library(library)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| HighlightError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> HighlightError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            HighlightError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: "the supplied password was rejected".to_string(),
            }
        } else {
            HighlightError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        HighlightError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

fn read_metadata(document: &PdfDocument<'_>) -> PdfMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let title = get_meta(PdfDocumentMetadataTagType::Title);
    let author = get_meta(PdfDocumentMetadataTagType::Author);
    let subject = get_meta(PdfDocumentMetadataTagType::Subject);
    let keywords = get_meta(PdfDocumentMetadataTagType::Keywords);
    let doi = [&subject, &keywords, &title]
        .into_iter()
        .flatten()
        .find_map(|field| sniff_doi(field));

    PdfMetadata {
        title,
        author,
        subject,
        keywords,
        doi,
        page_count: document.pages().len() as usize,
    }
}

static RE_DOI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b10\.\d{4,9}/[^\s\x22<>]+").unwrap());

/// First DOI-shaped token in free text, without trailing punctuation.
pub fn sniff_doi(text: &str) -> Option<String> {
    RE_DOI
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')', ']']).to_string())
}
