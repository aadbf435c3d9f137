//! Error types for manifest parsing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole manifest parse.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest path does not exist.
    #[error(
        "manifest file not found: {}\n  Suggestion: Check the configured manifest path",
        .0.display()
    )]
    NotFound(PathBuf),

    /// The file has no usable header row.
    #[error("invalid manifest format: {0}\n  Suggestion: The first line must name the columns")]
    Format(String),

    /// Reading the file failed.
    #[error("failed to read manifest: {0}")]
    Io(#[from] io::Error),

    /// The delimited reader hit an unrecoverable error.
    #[error("failed to read manifest rows: {0}")]
    Csv(#[from] csv::Error),
}

impl ManifestError {
    /// Creates a `Format` error for a file without headers.
    #[must_use]
    pub fn no_headers() -> Self {
        Self::Format("manifest file has no headers".to_string())
    }
}

/// A single row that could not be decoded. The row is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {line}: {reason}")]
pub struct RowParseError {
    /// 1-based line number in the source file (the header is line 1).
    pub line: u64,
    /// What went wrong.
    pub reason: String,
}

impl RowParseError {
    #[must_use]
    pub fn new(line: u64, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_error_not_found_message() {
        let err = ManifestError::NotFound(PathBuf::from("/data/Manifest_201807.tsv"));
        let msg = err.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("Manifest_201807.tsv"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_manifest_error_no_headers_message() {
        let msg = ManifestError::no_headers().to_string();
        assert!(msg.contains("no headers"));
    }

    #[test]
    fn test_row_parse_error_message() {
        let err = RowParseError::new(7, "invalid UTF-8 in column 3");
        assert_eq!(err.to_string(), "row 7: invalid UTF-8 in column 3");
    }
}
