//! GWAS library store.
//!
//! `SQLite`-backed persistence for [`CanonicalEntry`] records plus the
//! runtime state external collaborators maintain (cache location, download
//! counters). The unique index on `file_id` is the single source of truth
//! for "does this file already exist".
//!
//! # Overview
//!
//! - [`Library`] - Main interface for store operations
//! - [`LibraryEntry`] - Stored row with runtime state
//! - [`LibraryRepository`] - Abstract data-access seam
//! - [`LibraryError`] - Operation error types
//!
//! # Example
//!
//! ```ignore
//! use gwas_library::{Database, Library, EntryQuery};
//! use std::path::Path;
//!
//! let db = Database::new(Path::new("gwas_library.db")).await?;
//! let library = Library::new(db);
//!
//! let summary = library.bulk_merge(&entries).await?;
//! let page = library.list(&EntryQuery::new().search("height").limit(20)).await?;
//! library.increment_download_count(&page[0].file_id).await?;
//! ```

mod entry;
mod error;
mod repository;

pub use entry::{
    DEFAULT_LIST_LIMIT, DEFAULT_POPULAR_LIMIT, EntryFilter, EntryQuery, EntryUpdate, LibraryEntry,
    MergeSummary,
};
pub use error::{DbErrorKind, LibraryError};
pub use repository::LibraryRepository;

use std::time::Duration;

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use crate::db::{Database, WRITE_MAX_ATTEMPTS, WRITE_RETRY_BACKOFF_MS, finish_immediate};
use crate::manifest::CanonicalEntry;

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Appends `WHERE` conditions for `filter`.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &EntryFilter) {
    builder.push(" WHERE 1 = 1");

    match filter.match_expression() {
        Some(expression) if expression.is_empty() => {
            builder.push(" AND 0");
        }
        Some(expression) => {
            builder.push(
                " AND id IN (SELECT rowid FROM gwas_library_fts WHERE gwas_library_fts MATCH ",
            );
            builder.push_bind(expression);
            builder.push(")");
        }
        None => {}
    }

    if let Some(sex) = filter.sex {
        builder.push(" AND sex = ");
        builder.push_bind(sex.as_str());
    }
}

/// Runs the merge inserts on a connection that already holds the write lock.
async fn insert_entries(
    conn: &mut SqliteConnection,
    entries: &[CanonicalEntry],
) -> std::result::Result<MergeSummary, sqlx::Error> {
    let mut summary = MergeSummary::default();
    for entry in entries {
        if entry.file_id.is_empty() {
            continue;
        }

        let result = sqlx::query(
            r"INSERT INTO gwas_library (
                file_id,
                phenotype_code,
                display_name,
                description,
                showcase_link,
                sex,
                filename,
                wget_command,
                aws_url,
                dropbox_url,
                checksum,
                source,
                file_size
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(file_id) DO NOTHING",
        )
        .bind(&entry.file_id)
        .bind(&entry.phenotype_code)
        .bind(&entry.display_name)
        .bind(&entry.description)
        .bind(&entry.showcase_link)
        .bind(entry.sex.as_str())
        .bind(&entry.filename)
        .bind(&entry.wget_command)
        .bind(&entry.aws_url)
        .bind(&entry.dropbox_url)
        .bind(&entry.checksum)
        .bind(&entry.source)
        .bind(entry.file_size)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            summary.skipped += 1;
        } else {
            summary.inserted += 1;
        }
    }
    Ok(summary)
}

/// Store for GWAS library entries.
///
/// Every mutator is a single SQL statement (or, for merges, a single
/// immediate transaction), so concurrent callers need no extra locking.
#[derive(Debug, Clone)]
pub struct Library {
    db: Database,
}

impl Library {
    /// Creates a new library store over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Looks up an entry by `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, file_id: &str) -> Result<Option<LibraryEntry>> {
        let entry = sqlx::query_as::<_, LibraryEntry>(r"SELECT * FROM gwas_library WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(entry)
    }

    /// Lists entries matching `query`.
    ///
    /// Ordered by download count (descending) then display name (ascending).
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &EntryQuery) -> Result<Vec<LibraryEntry>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM gwas_library");
        push_filter(&mut builder, &query.filter);
        builder.push(" ORDER BY download_count DESC, display_name ASC LIMIT ");
        builder.push_bind(query.sql_limit());
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(query.offset));

        let entries = builder
            .build_query_as::<LibraryEntry>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(entries)
    }

    /// Counts entries matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self, filter: &EntryFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS count FROM gwas_library");
        push_filter(&mut builder, filter);

        let row = builder.build().fetch_one(self.db.pool()).await?;
        Ok(row.get("count"))
    }

    /// Counts every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_all(&self) -> Result<i64> {
        let row = sqlx::query(r"SELECT COUNT(*) AS count FROM gwas_library")
            .fetch_one(self.db.pool())
            .await?;

        Ok(row.get("count"))
    }

    /// Inserts every entry whose `file_id` is not yet stored.
    ///
    /// Runs as one `BEGIN IMMEDIATE` transaction of `INSERT ... ON
    /// CONFLICT(file_id) DO NOTHING` statements: existing rows (and their
    /// runtime state) are never touched and are counted as skipped. Entries
    /// with an empty `file_id` are ignored and not counted. Concurrent
    /// merges queue on the write lock; a merge that still finds the
    /// database locked is retried up to [`WRITE_MAX_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if any statement or the commit
    /// fails; the transaction is rolled back and nothing is written.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn bulk_merge(&self, entries: &[CanonicalEntry]) -> Result<MergeSummary> {
        if entries.is_empty() {
            return Ok(MergeSummary::default());
        }

        let mut attempt = 1;
        let summary = loop {
            match self.merge_once(entries).await {
                Ok(summary) => break summary,
                Err(err) if err.is_busy_or_locked() && attempt < WRITE_MAX_ATTEMPTS => {
                    warn!(attempt, error = %err, "Library locked, retrying bulk merge");
                    tokio::time::sleep(Duration::from_millis(
                        WRITE_RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            attempt,
            "Bulk merge complete"
        );
        Ok(summary)
    }

    async fn merge_once(&self, entries: &[CanonicalEntry]) -> Result<MergeSummary> {
        let mut conn = self.db.begin_immediate().await?;
        let merged = insert_entries(&mut conn, entries).await;
        Ok(finish_immediate(&mut conn, merged).await?)
    }

    /// Records that a file has been cached.
    ///
    /// Sets `downloaded`, `cache_location`, `file_size` and refreshes
    /// `last_accessed`/`updated_at`. Returns `false` if no entry matched.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_as_downloaded(
        &self,
        file_id: &str,
        cache_location: &str,
        file_size: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE gwas_library
              SET downloaded = 1,
                  cache_location = ?,
                  file_size = ?,
                  last_accessed = datetime('now'),
                  updated_at = datetime('now')
              WHERE file_id = ?",
        )
        .bind(cache_location)
        .bind(file_size)
        .bind(file_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!(file_id, "Failed to mark as downloaded: no such entry");
            return Ok(false);
        }
        info!(file_id, cache_location, "Marked as downloaded");
        Ok(true)
    }

    /// Atomically bumps `download_count` and refreshes access timestamps.
    ///
    /// Returns `false` if no entry matched.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn increment_download_count(&self, file_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE gwas_library
              SET download_count = download_count + 1,
                  last_accessed = datetime('now'),
                  updated_at = datetime('now')
              WHERE file_id = ?",
        )
        .bind(file_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!(file_id, "Failed to increment download count: no such entry");
            return Ok(false);
        }
        debug!(file_id, "Incremented download count");
        Ok(true)
    }

    /// Applies the set fields of `update` and refreshes `updated_at`.
    ///
    /// Returns `false` if no entry matched or `update` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn update_entry(&self, file_id: &str, update: &EntryUpdate) -> Result<bool> {
        if update.is_empty() {
            warn!(file_id, "No changes requested for entry");
            return Ok(false);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE gwas_library SET ");
        let mut set = builder.separated(", ");
        if let Some(display_name) = &update.display_name {
            set.push("display_name = ").push_bind_unseparated(display_name.clone());
        }
        if let Some(description) = &update.description {
            set.push("description = ").push_bind_unseparated(description.clone());
        }
        if let Some(showcase_link) = &update.showcase_link {
            set.push("showcase_link = ").push_bind_unseparated(showcase_link.clone());
        }
        if let Some(checksum) = &update.checksum {
            set.push("checksum = ").push_bind_unseparated(checksum.clone());
        }
        if let Some(file_size) = update.file_size {
            set.push("file_size = ").push_bind_unseparated(file_size);
        }
        if let Some(downloaded) = update.downloaded {
            set.push("downloaded = ").push_bind_unseparated(downloaded);
        }
        if let Some(cache_location) = &update.cache_location {
            set.push("cache_location = ").push_bind_unseparated(cache_location.clone());
        }
        set.push("updated_at = datetime('now')");
        builder.push(" WHERE file_id = ");
        builder.push_bind(file_id);

        let result = builder.build().execute(self.db.pool()).await?;

        if result.rows_affected() == 0 {
            warn!(file_id, "No changes made to entry: no such entry");
            return Ok(false);
        }
        info!(file_id, "Updated entry");
        Ok(true)
    }

    /// Returns the most downloaded entries.
    ///
    /// Ties are broken by display name so the ranking is stable.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn most_popular(&self, limit: u32) -> Result<Vec<LibraryEntry>> {
        let entries = sqlx::query_as::<_, LibraryEntry>(
            r"SELECT * FROM gwas_library
              ORDER BY download_count DESC, display_name ASC
              LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;

        Ok(entries)
    }
}
