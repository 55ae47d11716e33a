//! PDF text extraction.
//!
//! Produces one [`Page`] record per PDF page, in page order. Pages exist
//! only long enough to be chunked; nothing here touches the filesystem
//! beyond reading the input file.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read PDF file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse PDF: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// A single page of extracted text.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Plain text extracted from the page. May be empty for image-only pages.
    pub text: String,
}

/// Extract text from a PDF file on disk, one record per page.
pub fn load_pages(path: &Path) -> Result<Vec<Page>> {
    let bytes = std::fs::read(path)?;
    load_pages_from_bytes(&bytes)
}

/// Extract text from an in-memory PDF, one record per page.
///
/// Uploads arrive as raw bytes from the multipart handler, so this is the
/// primary entry point; [`load_pages`] is a convenience for the CLI.
pub fn load_pages_from_bytes(bytes: &[u8]) -> Result<Vec<Page>> {
    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| LoadError::Parse(e.to_string()))?;

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: i + 1,
            text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_pages(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        let err = load_pages_from_bytes(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }
}
