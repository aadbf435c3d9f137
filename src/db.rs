//! Database connection and schema management.
//!
//! This module provides SQLite database connectivity with:
//! - Connection pool management
//! - WAL mode for concurrent readers alongside the seeding writer
//! - Automatic migration execution (tables, unique/secondary indexes, FTS5)
//!
//! # Example
//!
//! ```no_run
//! use gwas_library::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("gwas_library.db")).await?;
//! // Hand clones of `db` to Library / PhenotypeCatalog...
//! db.close().await;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{instrument, warn};

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds.
/// Connections will wait this long before returning SQLITE_BUSY.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Attempts made for a write transaction that keeps hitting a locked database.
pub(crate) const WRITE_MAX_ATTEMPTS: u32 = 3;

/// Backoff step between write attempts; multiplied by the attempt number.
pub(crate) const WRITE_RETRY_BACKOFF_MS: u64 = 100;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Tunables for the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Database connection wrapper with connection pool.
///
/// Cloning is cheap: clones share the same underlying pool, so one
/// `Database` can be handed to every store that needs it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path` with default options.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        Self::with_options(db_path, DatabaseOptions::default()).await
    }

    /// Opens the database at `db_path` with explicit pool options.
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Enable WAL mode for concurrent reads
    /// 3. Run any pending migrations
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn with_options(db_path: &Path, options: DatabaseOptions) -> Result<Self, DbError> {
        // Pragmas go on the connect options so every pooled connection gets
        // them, not just the first one.
        let connect_options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(u64::from(options.busy_timeout_ms)));

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// The database exists only for the lifetime of the single pooled
    /// connection. WAL mode is not enabled for in-memory databases.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.to_lowercase() == "wal")
    }

    /// Acquires a pooled connection and opens a write transaction on it.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so a competing
    /// writer waits out the busy timeout here instead of failing with
    /// `SQLITE_BUSY` halfway through its batch. Pair with
    /// [`finish_immediate`].
    pub(crate) async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }

    /// Gracefully closes all connections in the pool.
    ///
    /// Call before the host exits. After this the handle (and every clone
    /// of it) must not be used.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Commits the transaction opened by [`Database::begin_immediate`] when
/// `result` is `Ok`, rolls it back otherwise.
///
/// A connection whose transaction state is unknown is closed rather than
/// returned to the pool.
pub(crate) async fn finish_immediate<T>(
    conn: &mut PoolConnection<Sqlite>,
    result: Result<T, sqlx::Error>,
) -> Result<T, sqlx::Error> {
    match result {
        Ok(value) => {
            if let Err(err) = sqlx::query("COMMIT").execute(&mut **conn).await {
                if sqlx::query("ROLLBACK").execute(&mut **conn).await.is_err() {
                    conn.close_on_drop();
                }
                return Err(err);
            }
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut **conn).await {
                warn!(error = %rollback_err, "Rollback failed, discarding connection");
                conn.close_on_drop();
            }
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_new_in_memory_succeeds() {
        let db = Database::new_in_memory().await;
        assert!(db.is_ok(), "Failed to create in-memory database");
    }

    #[tokio::test]
    async fn test_database_gwas_library_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO gwas_library (file_id, display_name, description, filename, source)
             VALUES ('a.tsv', 'A', 'A', 'a.tsv', 'UK Biobank')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_ok(), "gwas_library table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_file_id_is_unique() {
        let db = Database::new_in_memory().await.unwrap();
        let insert = "INSERT INTO gwas_library (file_id, display_name, description, filename, source)
                      VALUES ('dup.tsv', 'D', 'D', 'dup.tsv', 'UK Biobank')";

        sqlx::query(insert).execute(db.pool()).await.unwrap();
        let second = sqlx::query(insert).execute(db.pool()).await;

        assert!(second.is_err(), "unique index on file_id should reject duplicates");
    }

    #[tokio::test]
    async fn test_database_sex_check_constraint() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO gwas_library (file_id, display_name, description, filename, source, sex)
             VALUES ('x.tsv', 'X', 'X', 'x.tsv', 'UK Biobank', 'males')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_err(), "non-canonical sex should be rejected by CHECK");
    }

    #[tokio::test]
    async fn test_database_phenotypes_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query("INSERT INTO phenotypes (id, phenotype_name) VALUES ('50', 'Height')")
            .execute(db.pool())
            .await;

        assert!(result.is_ok(), "phenotypes table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_with_tempfile_enables_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).await;
        assert!(db.is_ok(), "Failed to create database at temp path");

        let db = db.unwrap();
        let is_wal = db.is_wal_enabled().await.unwrap();
        assert!(is_wal, "WAL mode should be enabled for file-based database");
    }

    #[tokio::test]
    async fn test_database_reopen_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("reopen.db");

        let first = Database::new(&db_path).await.unwrap();
        first.close().await;

        let second = Database::new(&db_path).await;
        assert!(second.is_ok(), "re-running migrations on an existing file should succeed");
    }

    #[tokio::test]
    async fn test_database_with_options_applies_busy_timeout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("opts.db");
        let options = DatabaseOptions {
            max_connections: 1,
            busy_timeout_ms: 1234,
        };

        let db = Database::with_options(&db_path, options).await.unwrap();
        let (timeout,): (i64,) = sqlx::query_as("PRAGMA busy_timeout")
            .fetch_one(db.pool())
            .await
            .unwrap();

        assert_eq!(timeout, 1234);
    }

    #[tokio::test]
    async fn test_immediate_transaction_commits_or_rolls_back() {
        let db = Database::new_in_memory().await.unwrap();

        let mut conn = db.begin_immediate().await.unwrap();
        let inserted = sqlx::query("INSERT INTO phenotypes (id, phenotype_name) VALUES ('1', 'Kept')")
            .execute(&mut *conn)
            .await
            .map(|_| ());
        finish_immediate(&mut conn, inserted).await.unwrap();
        drop(conn);

        let mut conn = db.begin_immediate().await.unwrap();
        sqlx::query("INSERT INTO phenotypes (id, phenotype_name) VALUES ('2', 'Dropped')")
            .execute(&mut *conn)
            .await
            .unwrap();
        let failed: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        assert!(finish_immediate(&mut conn, failed).await.is_err());
        drop(conn);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM phenotypes")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_immediate_transaction_waits_for_writer() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("writers.db")).await.unwrap();

        let mut holder = db.begin_immediate().await.unwrap();
        let waiter = {
            let db = db.clone();
            tokio::spawn(async move {
                let mut conn = db.begin_immediate().await?;
                finish_immediate(&mut conn, Ok(())).await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!waiter.is_finished(), "second writer should wait for the lock");
        finish_immediate(&mut holder, Ok(())).await.unwrap();
        drop(holder);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_database_close_works() {
        let db = Database::new_in_memory().await.unwrap();
        db.close().await;
    }
}
