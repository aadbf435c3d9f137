//! Error types for library store operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl DbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(database_error: &(dyn sqlx::error::DatabaseError + 'static)) -> DbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return DbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return DbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return DbErrorKind::BusyOrLocked;
    }

    DbErrorKind::Other
}

/// Errors that can occur during library store operations.
///
/// "No such entry" is not an error: lookups return `None` and mutators
/// return `false`.
#[derive(Debug, Clone, Error)]
pub enum LibraryError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },
}

impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl LibraryError {
    /// Returns the typed database error kind.
    #[must_use]
    pub fn database_kind(&self) -> DbErrorKind {
        match self {
            Self::Database { kind, .. } => *kind,
        }
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.database_kind() == DbErrorKind::BusyOrLocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_error_database_message() {
        let err = LibraryError::Database {
            kind: DbErrorKind::Other,
            message: "connection failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("database error"));
        assert!(msg.contains("other"));
        assert!(msg.contains("connection failed"));
    }

    #[test]
    fn test_library_error_busy_flag() {
        let err = LibraryError::Database {
            kind: DbErrorKind::BusyOrLocked,
            message: "database is locked".to_string(),
        };
        assert_eq!(err.database_kind(), DbErrorKind::BusyOrLocked);
        assert!(err.is_busy_or_locked());
    }

    #[test]
    fn test_db_error_kind_from_pool_errors() {
        assert_eq!(
            DbErrorKind::from_sqlx(&sqlx::Error::PoolTimedOut),
            DbErrorKind::PoolTimeout
        );
        assert_eq!(
            DbErrorKind::from_sqlx(&sqlx::Error::PoolClosed),
            DbErrorKind::PoolClosed
        );
        assert_eq!(
            DbErrorKind::from_sqlx(&sqlx::Error::RowNotFound),
            DbErrorKind::RowNotFound
        );
    }

    #[test]
    fn test_library_error_from_sqlx_keeps_message() {
        let err = LibraryError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.database_kind(), DbErrorKind::PoolClosed);
        assert!(err.to_string().contains("pool_closed"));
    }
}
