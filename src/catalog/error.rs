//! Error types for phenotype catalog operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::library::DbErrorKind;

/// Errors that can occur while loading or storing the phenotype catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("failed to read phenotype catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catalog file is not a JSON array.
    #[error(
        "invalid phenotype catalog {path}: {source}\n  Suggestion: The catalog must be a JSON array of {{\"id\": ..., \"name\": ...}} objects"
    )]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database { kind: DbErrorKind, message: String },
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl CatalogError {
    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        matches!(
            self,
            Self::Database {
                kind: DbErrorKind::BusyOrLocked,
                ..
            }
        )
    }
}
