//! Pipeline orchestrator: one document, or a batch of them.
//!
//! ## Layers
//!
//! * [`process_annotations`]: pure: raw annotations + file name + store →
//!   enriched record + report. No pdfium, no filesystem.
//! * [`process_document`]: validate, extract, process, write. Blocking.
//! * [`process_batch`]: many documents concurrently on tokio's blocking
//!   pool, one shared read-only [`BibStore`].
//!
//! A document without highlights is `skipped` and writes nothing. Weak or
//! failed matches are `warning` and still write output; only an unreadable
//! PDF or an unwritable output location fails a document, and in a batch
//! that failure is recorded while the other documents continue. Documents
//! in one batch that wrote the same output file are flagged `warning`.

use crate::bib::BibStore;
use crate::config::ExportConfig;
use crate::error::HighlightError;
use crate::export::{self, csv, json, markdown, safe_file_component};
use crate::model::{EnrichedRecord, PdfMetadata, RawAnnotation};
use crate::output::{BatchReport, DocumentFailure, DocumentReport, InspectReport, Outcome, WrittenFiles};
use crate::pipeline::filename::{file_stem, parse_filename};
use crate::pipeline::matcher::{match_document, MatchQuery};
use crate::pipeline::{assemble, extract, input, sanitize};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the extraction stage hands the orchestrator for one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    /// Base name of the source PDF, e.g. `Deep Learning_LeCun_2015.pdf`.
    pub file_name: String,
    pub annotations: Vec<RawAnnotation>,
    /// Embedded PDF metadata, when the document was opened.
    pub metadata: Option<PdfMetadata>,
}

/// The record (absent when skipped) and its report.
#[derive(Debug, Clone)]
pub struct DocumentRun {
    pub record: Option<EnrichedRecord>,
    pub report: DocumentReport,
}

/// Sanitize → parse file name → match → assemble, for one document.
pub fn process_annotations(input: &DocumentInput, store: &BibStore, config: &ExportConfig) -> DocumentRun {
    if input.annotations.is_empty() {
        info!("No highlights found in {}; skipping", input.file_name);
        return DocumentRun {
            record: None,
            report: DocumentReport::skipped(&input.file_name),
        };
    }

    let annotations = sanitize::sanitize_annotations(&input.annotations);
    let stem = file_stem(&input.file_name);
    let parsed = parse_filename(&input.file_name, &config.filename_delimiter);
    debug!("{}: parsed file name {:?}", input.file_name, parsed);

    let query = MatchQuery::new(stem, &parsed, input.metadata.as_ref());
    let matched = match_document(&query, store, &config.thresholds, config.precedence);
    if matched.warning {
        warn!("{}: {}", input.file_name, matched.reasons.join("; "));
    }

    let record = assemble::assemble(
        annotations,
        &parsed,
        &matched,
        input.metadata.as_ref(),
        stem,
        &config.filename_delimiter,
    );

    let missing: Vec<String> = record.missing_fields().into_iter().map(String::from).collect();
    let mut warnings = matched.reasons.clone();
    if !missing.is_empty() {
        warnings.push(format!("missing {}", missing.join(", ")));
    }
    let outcome = if matched.warning || !missing.is_empty() {
        Outcome::Warning
    } else {
        Outcome::Ok
    };

    let report = DocumentReport {
        file_name: input.file_name.clone(),
        outcome,
        highlight_count: record.annotations.len(),
        matched_key: matched.entry.map(|e| e.citation_key.clone()),
        confidence: matched.confidence,
        strategy: matched.strategy.map(|s| s.to_string()),
        missing_fields: missing,
        warnings,
        files: WrittenFiles::default(),
    };
    DocumentRun {
        record: Some(record),
        report,
    }
}

/// Write the selected formats for one record.
///
/// JSON and CSV are named after the source stem; Markdown after the
/// citation key and entry type when known.
pub fn write_outputs(record: &EnrichedRecord, stem: &str, config: &ExportConfig) -> Result<WrittenFiles, HighlightError> {
    let base = safe_file_component(stem);
    let mut files = WrittenFiles::default();

    if config.formats.json {
        let path = config.json_dir.join(format!("{base}.json"));
        export::write_atomic(&path, &json::render(record)?)?;
        files.json = Some(path);
    }
    if config.formats.csv {
        let path = config.csv_dir.join(format!("{base}.csv"));
        export::write_atomic(&path, &csv::render(record, &config.category)?)?;
        files.csv = Some(path);
    }
    if config.formats.markdown {
        let path = config.markdown_dir.join(markdown::file_name(record, stem));
        export::write_atomic(&path, markdown::render(record, &config.color_tags).as_bytes())?;
        files.markdown = Some(path);
    }
    debug!("{}: wrote {:?}", stem, files);
    Ok(files)
}

/// Validate, extract, process and write one PDF. Blocking.
///
/// # Errors
/// Returns `Err(HighlightError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - pdfium unavailable, corrupt or encrypted PDF
/// - An output file could not be written
pub fn process_document(path: &Path, store: &BibStore, config: &ExportConfig) -> Result<DocumentReport, HighlightError> {
    let start = Instant::now();
    let pdf_path = input::resolve_input(path)?;
    let extracted = extract::extract_document_blocking(&pdf_path, config.password.as_deref())?;

    let input = DocumentInput {
        file_name: input::display_name(&pdf_path),
        annotations: extracted.annotations,
        metadata: Some(extracted.metadata),
    };
    let DocumentRun { record, mut report } = process_annotations(&input, store, config);
    if let Some(record) = record {
        report.files = write_outputs(&record, file_stem(&input.file_name), config)?;
    }
    info!(
        "{}: {} in {}ms",
        input.file_name,
        report.outcome,
        start.elapsed().as_millis()
    );
    Ok(report)
}

/// Render CSV and Markdown from a previously written enriched JSON file,
/// without touching the PDF. The JSON itself is never rewritten.
pub fn render_from_json(path: &Path, config: &ExportConfig) -> Result<DocumentReport, HighlightError> {
    let record = EnrichedRecord::from_json_file(path)?;
    let file_name = input::display_name(path);
    if record.annotations.is_empty() {
        info!("No highlights in {}; skipping", file_name);
        return Ok(DocumentReport::skipped(file_name));
    }

    let config = ExportConfig {
        formats: crate::config::OutputFormats {
            json: false,
            ..config.formats
        },
        ..config.clone()
    };
    let files = write_outputs(&record, file_stem(&file_name), &config)?;

    let missing: Vec<String> = record.missing_fields().into_iter().map(String::from).collect();
    let warnings = if missing.is_empty() {
        Vec::new()
    } else {
        vec![format!("missing {}", missing.join(", "))]
    };
    Ok(DocumentReport {
        file_name,
        outcome: if missing.is_empty() { Outcome::Ok } else { Outcome::Warning },
        highlight_count: record.annotations.len(),
        matched_key: record.meta.citation_key.clone(),
        confidence: if record.meta.citation_key.is_some() { 1.0 } else { 0.0 },
        strategy: Some("enriched-json".to_string()),
        missing_fields: missing,
        warnings,
        files,
    })
}

/// Process many PDFs concurrently, at most `config.concurrency` at once.
///
/// Never fails as a whole: per-document fatal errors are collected in
/// [`BatchReport::failures`]. Completed documents are reported in input
/// order regardless of completion order.
pub async fn process_batch(paths: Vec<PathBuf>, store: Arc<BibStore>, config: &ExportConfig) -> BatchReport {
    let start = Instant::now();
    let total = paths.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }
    info!("Processing {} documents (concurrency {})", total, config.concurrency);

    let mut results: Vec<(usize, Result<DocumentReport, DocumentFailure>)> =
        stream::iter(paths.into_iter().enumerate().map(|(index, path)| {
            let store = Arc::clone(&store);
            let config_clone = config.clone();
            async move {
                let file_name = input::display_name(&path);
                if let Some(ref cb) = config_clone.progress_callback {
                    cb.on_document_start(index, total, &file_name);
                }
                let cb = config_clone.progress_callback.clone();
                let result = tokio::task::spawn_blocking(move || process_document(&path, &store, &config_clone))
                    .await
                    .unwrap_or_else(|e| Err(HighlightError::Internal(format!("Document task panicked: {}", e))));

                let result = match result {
                    Ok(report) => {
                        if let Some(ref cb) = cb {
                            cb.on_document_complete(index, total, &report);
                        }
                        Ok(report)
                    }
                    Err(e) => {
                        warn!("{}: {}", file_name, e);
                        let error = e.to_string();
                        if let Some(ref cb) = cb {
                            cb.on_document_error(index, total, &file_name, &error);
                        }
                        Err(DocumentFailure { file_name, error })
                    }
                };
                (index, result)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    let mut report = BatchReport {
        skipped_entries: store.skipped().to_vec(),
        ..BatchReport::default()
    };
    for (_, result) in results {
        match result {
            Ok(doc) => report.documents.push(doc),
            Err(failure) => report.failures.push(failure),
        }
    }
    flag_shared_outputs(&mut report.documents);
    report.elapsed_ms = start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&report);
    }
    report
}

/// Warn on every document whose output file was also written by another
/// document of the batch; only the last writer's content survives.
pub(crate) fn flag_shared_outputs(documents: &mut [DocumentReport]) {
    let mut writers: BTreeMap<&Path, Vec<usize>> = BTreeMap::new();
    for (index, doc) in documents.iter().enumerate() {
        let files = [&doc.files.json, &doc.files.csv, &doc.files.markdown];
        for path in files.into_iter().flatten() {
            writers.entry(path.as_path()).or_default().push(index);
        }
    }

    let shared: Vec<(PathBuf, Vec<usize>)> = writers
        .into_iter()
        .filter(|(_, indices)| indices.len() > 1)
        .map(|(path, indices)| (path.to_path_buf(), indices))
        .collect();

    for (path, indices) in shared {
        warn!("{} written by {} documents", path.display(), indices.len());
        for &index in &indices {
            let others = indices
                .iter()
                .filter(|&&other| other != index)
                .map(|&other| documents[other].file_name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let doc = &mut documents[index];
            doc.warnings
                .push(format!("output {} also written by {}", path.display(), others));
            if doc.outcome == Outcome::Ok {
                doc.outcome = Outcome::Warning;
            }
        }
    }
}

/// Read a PDF's metadata and count its highlights without matching or
/// writing anything.
pub async fn inspect(path: &Path, password: Option<&str>) -> Result<InspectReport, HighlightError> {
    let pdf_path = input::resolve_input(path)?;
    let extracted = extract::extract_document(&pdf_path, password).await?;
    let file_name = input::display_name(&pdf_path);
    Ok(InspectReport {
        filename: parse_filename(&file_name, crate::config::DEFAULT_FILENAME_DELIMITER),
        file_name,
        highlight_count: extracted.annotations.len(),
        metadata: extracted.metadata,
    })
}
