//! # pdf-highlights
//!
//! Export the highlights of annotated PDFs, matched against a BibTeX
//! library, as Markdown notes, highlight-import CSV and enriched JSON.
//!
//! ## Why this crate?
//!
//! Highlights live inside the PDF, while the bibliographic facts (authors,
//! year, citation key) live in a reference manager's `.bib` export. This
//! crate joins the two: it finds the bibliography entry a PDF belongs to
//! from its file name, embedded metadata or DOI, and renders byte-stable
//! output that note vaults and import tools can rely on.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path, %PDF magic bytes
//!  ├─ 2. Extract   highlight annotations + info dictionary via pdfium
//!  ├─ 3. Sanitize  single-line printable Unicode
//!  ├─ 4. Match     citation key / exact title / DOI / fuzzy title+authors+year
//!  ├─ 5. Assemble  one EnrichedRecord, the single source of truth
//!  └─ 6. Export    JSON, CSV, Markdown (atomic writes)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_highlights::{process_document, BibStore, ExportConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = BibStore::load(Path::new("library.bib"))?;
//!     let config = ExportConfig::builder().output_dir("out").build()?;
//!     let report = process_document(Path::new("Deep Learning_LeCun_2015.pdf"), &store, &config)?;
//!     println!("{}", report.summary_line());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-highlights` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf-highlights = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bib;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bib::{BibEntry, BibStore};
pub use config::{
    ColorTagMap, ExportConfig, ExportConfigBuilder, MatchThresholds, OutputFormats, ProjectConfig,
    SourcePrecedence,
};
pub use convert::{
    inspect, process_annotations, process_batch, process_document, render_from_json, write_outputs,
    DocumentInput, DocumentRun,
};
pub use error::{BibParseError, HighlightError, SkippedEntry};
pub use model::{Annotation, EnrichedRecord, Meta, PdfMetadata, RawAnnotation};
pub use output::{BatchReport, DocumentFailure, DocumentReport, InspectReport, Outcome, WrittenFiles};
pub use pipeline::matcher::{MatchResult, MatchStrategy};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
