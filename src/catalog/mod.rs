//! Phenotype catalog store.
//!
//! A second, much simpler collection next to the GWAS library: a flat list
//! of `{id, phenotype_name}` records loaded from a JSON catalog file.

mod error;

pub use error::CatalogError;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Row, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use crate::db::{Database, WRITE_MAX_ATTEMPTS, WRITE_RETRY_BACKOFF_MS, finish_immediate};
use crate::library::MergeSummary;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PhenotypeRecord {
    pub id: String,
    pub phenotype_name: String,
}

impl PhenotypeRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, phenotype_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phenotype_name: phenotype_name.into(),
        }
    }
}

/// Converts a JSON scalar into catalog text.
///
/// Strings are trimmed; numbers are stringified; anything else is rejected.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Maps raw catalog items (`{"id": ..., "name": ...}`) to records.
///
/// Items that are not objects, or lack a usable `id` or `name`, are dropped.
#[must_use]
pub fn catalog_records(items: &[Value]) -> Vec<PhenotypeRecord> {
    items
        .iter()
        .filter_map(|item| {
            let id = scalar_text(item.get("id"))?;
            let phenotype_name = scalar_text(item.get("name"))?;
            Some(PhenotypeRecord { id, phenotype_name })
        })
        .collect()
}

/// Reads a catalog file into records.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] if the file cannot be read and
/// [`CatalogError::Json`] if it is not a JSON array.
#[instrument]
pub fn load_catalog_records(path: &Path) -> Result<Vec<PhenotypeRecord>> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let items: Vec<Value> = serde_json::from_str(&content).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let records = catalog_records(&items);
    debug!(
        items = items.len(),
        records = records.len(),
        "Loaded phenotype catalog"
    );
    Ok(records)
}

/// Runs the catalog inserts on a connection that already holds the write lock.
async fn insert_records(
    conn: &mut SqliteConnection,
    records: &[PhenotypeRecord],
) -> std::result::Result<MergeSummary, sqlx::Error> {
    let mut summary = MergeSummary::default();
    for record in records {
        let result = sqlx::query(
            r"INSERT INTO phenotypes (id, phenotype_name)
              VALUES (?, ?)
              ON CONFLICT(id) DO NOTHING",
        )
        .bind(&record.id)
        .bind(&record.phenotype_name)
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

/// Store for phenotype catalog records.
#[derive(Debug, Clone)]
pub struct PhenotypeCatalog {
    db: Database,
}

impl PhenotypeCatalog {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Counts stored phenotypes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query(r"SELECT COUNT(*) AS count FROM phenotypes")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("count"))
    }

    /// Inserts records whose `id` is not yet stored; existing ids are skipped.
    ///
    /// Like [`Library::bulk_merge`](crate::Library::bulk_merge), runs in one
    /// immediate transaction and retries while the database stays locked.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if any insert or the commit fails.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn bulk_create(&self, records: &[PhenotypeRecord]) -> Result<MergeSummary> {
        if records.is_empty() {
            return Ok(MergeSummary::default());
        }

        let mut attempt = 1;
        let summary = loop {
            match self.create_once(records).await {
                Ok(summary) => break summary,
                Err(err) if err.is_busy_or_locked() && attempt < WRITE_MAX_ATTEMPTS => {
                    warn!(attempt, error = %err, "Catalog locked, retrying bulk create");
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
            "Phenotype bulk create complete"
        );
        Ok(summary)
    }

    async fn create_once(&self, records: &[PhenotypeRecord]) -> Result<MergeSummary> {
        let mut conn = self.db.begin_immediate().await?;
        let created = insert_records(&mut conn, records).await;
        Ok(finish_immediate(&mut conn, created).await?)
    }

    /// Looks up a phenotype by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<PhenotypeRecord>> {
        let record = sqlx::query_as::<_, PhenotypeRecord>(
            r"SELECT id, phenotype_name FROM phenotypes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(record)
    }

    /// Lists phenotypes ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: u32, offset: u32) -> Result<Vec<PhenotypeRecord>> {
        let limit = if limit == 0 { -1 } else { i64::from(limit) };
        let records = sqlx::query_as::<_, PhenotypeRecord>(
            r"SELECT id, phenotype_name FROM phenotypes
              ORDER BY phenotype_name ASC, id ASC
              LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(i64::from(offset))
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_catalog_records_maps_name_and_stringifies_ids() {
        let items = vec![
            json!({"id": "20002_1065", "name": "Hypertension"}),
            json!({"id": 50, "name": "Standing height"}),
        ];
        assert_eq!(
            catalog_records(&items),
            vec![
                PhenotypeRecord::new("20002_1065", "Hypertension"),
                PhenotypeRecord::new("50", "Standing height"),
            ]
        );
    }

    #[test]
    fn test_catalog_records_drops_incomplete_items() {
        let items = vec![
            json!({"id": "1"}),
            json!({"name": "No id"}),
            json!({"id": null, "name": "Null id"}),
            json!({"id": ["x"], "name": "Array id"}),
            json!({"id": "  ", "name": "Blank id"}),
            json!("not an object"),
            json!({"id": "2", "name": "Kept", "extra": true}),
        ];
        assert_eq!(catalog_records(&items), vec![PhenotypeRecord::new("2", "Kept")]);
    }

    #[test]
    fn test_load_catalog_records_rejects_non_array() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"id\": \"1\", \"name\": \"x\"}}").unwrap();
        let err = load_catalog_records(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Json { .. }));
    }

    #[test]
    fn test_load_catalog_records_missing_file_is_io_error() {
        let err = load_catalog_records(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[tokio::test]
    async fn test_bulk_create_is_insert_if_absent() {
        let catalog = PhenotypeCatalog::new(Database::new_in_memory().await.unwrap());
        let first = catalog
            .bulk_create(&[PhenotypeRecord::new("1", "A"), PhenotypeRecord::new("2", "B")])
            .await
            .unwrap();
        assert_eq!(first, MergeSummary { inserted: 2, skipped: 0 });

        let second = catalog
            .bulk_create(&[PhenotypeRecord::new("2", "Renamed"), PhenotypeRecord::new("3", "C")])
            .await
            .unwrap();
        assert_eq!(second, MergeSummary { inserted: 1, skipped: 1 });

        assert_eq!(catalog.count().await.unwrap(), 3);
        assert_eq!(catalog.get("2").await.unwrap().unwrap().phenotype_name, "B");
        assert!(catalog.get("9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_name_and_paginates() {
        let catalog = PhenotypeCatalog::new(Database::new_in_memory().await.unwrap());
        catalog
            .bulk_create(&[
                PhenotypeRecord::new("1", "Cholesterol"),
                PhenotypeRecord::new("2", "Asthma"),
                PhenotypeRecord::new("3", "Body mass index"),
            ])
            .await
            .unwrap();

        let names: Vec<_> = catalog
            .list(0, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.phenotype_name)
            .collect();
        assert_eq!(names, vec!["Asthma", "Body mass index", "Cholesterol"]);

        let page = catalog.list(1, 1).await.unwrap();
        assert_eq!(page, vec![PhenotypeRecord::new("3", "Body mass index")]);
    }
}
