//! Pipeline stages for highlight export.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the matcher can be tuned without touching
//! extraction or rendering.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ sanitize ──┐
//! (path)    (pdfium)    (cleanup)  │
//!                                  ├──▶ matcher ──▶ assemble ──▶ export::*
//! file name ──▶ filename ──────────┘   (BibStore)   (record)
//!                  names ◀── bib (author/editor fields)
//! ```
//!
//! 1. [`input`]   : validate the user-supplied path, expand directories
//! 2. [`extract`] : read highlight annotations and the info dictionary;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`sanitize`]: single-line printable Unicode for texts and notes
//! 4. [`filename`]: `Title_Authors_Year` hints from the file name
//! 5. [`names`]   : BibTeX person lists to `First Last`
//! 6. [`matcher`] : staged, short-circuiting bibliography matching
//! 7. [`assemble`]: the enriched record every renderer consumes

pub mod assemble;
pub mod extract;
pub mod filename;
pub mod input;
pub mod matcher;
pub mod names;
pub mod sanitize;
