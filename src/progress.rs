//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as [`crate::convert::process_batch`] works through its documents.
//!
//! # Example
//!
//! ```rust
//! use pdf_highlights::{BatchProgressCallback, DocumentReport, ExportConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _index: usize, total: usize, report: &DocumentReport) {
//!         let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total}: {} -> {}", report.file_name, report.outcome);
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchReport, DocumentReport};
use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// Documents run concurrently, so `on_document_*` may be called from
/// different threads at once and in any order. All methods default to
/// no-ops so callers only override what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is opened.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document is extracted.
    ///
    /// # Arguments
    /// * `index`: 0-indexed position in the input list
    /// * `total`: number of documents in the batch
    /// * `file_name`: base name of the PDF
    fn on_document_start(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when a document finished with outcome ok, warning or skipped.
    fn on_document_complete(&self, index: usize, total: usize, report: &DocumentReport) {
        let _ = (index, total, report);
    }

    /// Called when a document failed fatally (unreadable PDF, write error).
    fn on_document_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        let _ = (index, total, file_name, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
