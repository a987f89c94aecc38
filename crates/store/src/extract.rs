//! Text extraction feeding text documents.

use cairn_core::error::StoreError;
use std::path::Path;

/// Turns a source file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, StoreError>;
}

/// Reads UTF-8 files as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, StoreError> {
        std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_utf8_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "Première ligne\nSecond line").unwrap();
        let text = PlainTextExtractor.extract(&file).unwrap();
        assert_eq!(text, "Première ligne\nSecond line");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PlainTextExtractor.extract(Path::new("/nonexistent/notes.txt")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
