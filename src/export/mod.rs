//! Renderers for the enriched record, plus the atomic file writer they share.
//!
//! Every renderer consumes only an [`EnrichedRecord`] and is pure: the same
//! record always renders to the same bytes. Writing is kept separate so the
//! renderers can be tested without touching the filesystem.
//!
//! | Format   | File name                                   | Module       |
//! |----------|---------------------------------------------|--------------|
//! | JSON     | `<stem>.json`                               | [`json`]     |
//! | CSV      | `<stem>.csv`                                | [`csv`]      |
//! | Markdown | `<citation-key> <type>-pdf.md` or `<stem>.md` | [`markdown`] |
//!
//! [`EnrichedRecord`]: crate::model::EnrichedRecord

pub mod csv;
pub mod json;
pub mod markdown;

use crate::error::HighlightError;
use std::io::Write;
use std::path::Path;

/// Write `contents` to `path` via a uniquely named sibling temp file and a
/// rename, creating the parent directory if needed. Readers never observe a
/// partial file, and concurrent writers to one target never share a temp.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), HighlightError> {
    let write_failed = |source| HighlightError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return Err(HighlightError::Internal(format!("output path has no file name: {}", path.display()))),
    };
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
            parent
        }
        None => Path::new("."),
    };

    // Dropping the temp file on an early return deletes it.
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_failed)?;
    tmp.write_all(contents).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}

/// Replace characters that are unsafe in file names on common filesystems.
pub fn safe_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_dirs_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/file.md");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn write_atomic_concurrent_writers_to_one_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let bodies: Vec<String> = (0..8).map(|i| format!("writer {i} {}", "x".repeat(4096))).collect();

        std::thread::scope(|scope| {
            for body in &bodies {
                let path = &path;
                scope.spawn(move || write_atomic(path, body.as_bytes()).unwrap());
            }
        });

        // Last rename wins, and it is always one complete body.
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(bodies.contains(&written));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_atomic_reports_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").unwrap();
        let err = write_atomic(&blocker.join("out.md"), b"x").unwrap_err();
        assert!(matches!(err, HighlightError::OutputWriteFailed { .. }));
    }

    #[test]
    fn safe_file_component_replaces_reserved() {
        assert_eq!(safe_file_component("a/b:c?.md"), "a_b_c_.md");
        assert_eq!(safe_file_component("  "), "untitled");
        assert_eq!(safe_file_component(".."), "untitled");
    }
}
