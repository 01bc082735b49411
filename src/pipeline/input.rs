//! Input resolution: validate user-supplied paths before pdfium sees them.
//!
//! pdfium reports a missing file, an unreadable file and a non-PDF file
//! with the same opaque load error. Checking existence, read permission and
//! the `%PDF` magic bytes up front gives each case its own error.

use crate::error::HighlightError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` is a readable PDF.
pub fn resolve_input(path: &Path) -> Result<PathBuf, HighlightError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(HighlightError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(HighlightError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(HighlightError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(HighlightError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Expand directories into the `*.pdf` files they directly contain.
///
/// Files are passed through unchecked; directory contents are sorted by
/// name so batch order is stable.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, HighlightError> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            out.push(input.clone());
            continue;
        }
        let entries = std::fs::read_dir(input).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => HighlightError::PermissionDenied { path: input.clone() },
            _ => HighlightError::FileNotFound { path: input.clone() },
        })?;
        let mut pdfs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_pdf_name(p))
            .collect();
        pdfs.sort();
        debug!("{} PDFs in {}", pdfs.len(), input.display());
        out.extend(pdfs);
    }
    Ok(out)
}

fn is_pdf_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Base name of a path as a `String`, for reports and file-name parsing.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = resolve_input(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, HighlightError::FileNotFound { .. }));
    }

    #[test]
    fn test_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04zip").unwrap();
        match resolve_input(&path).unwrap_err() {
            HighlightError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_pdf_magic_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_input(&path).unwrap(), path);
    }

    #[test]
    fn test_expand_inputs_sorted_pdfs_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        let loose = PathBuf::from("/elsewhere/c.pdf");
        let out = expand_inputs(&[dir.path().to_path_buf(), loose.clone()]).unwrap();
        assert_eq!(out, vec![dir.path().join("a.PDF"), dir.path().join("b.pdf"), loose]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/x/y/Paper_Doe_2020.pdf")), "Paper_Doe_2020.pdf");
    }
}
