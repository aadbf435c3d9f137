//! Repository seam for library persistence operations.
//!
//! Seeding and the CLI depend on this trait rather than on [`Library`]
//! directly, so failure paths can be exercised with in-memory fakes.

use async_trait::async_trait;

use super::{
    EntryFilter, EntryQuery, EntryUpdate, Library, LibraryEntry, MergeSummary, Result,
};
use crate::manifest::CanonicalEntry;

/// Data-access contract for the GWAS library.
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Looks up an entry by `file_id`.
    async fn get(&self, file_id: &str) -> Result<Option<LibraryEntry>>;

    /// Lists entries matching a query.
    async fn list(&self, query: &EntryQuery) -> Result<Vec<LibraryEntry>>;

    /// Counts entries matching a filter.
    async fn count(&self, filter: &EntryFilter) -> Result<i64>;

    /// Counts every stored entry.
    async fn count_all(&self) -> Result<i64>;

    /// Inserts entries whose `file_id` is not yet stored.
    async fn bulk_merge(&self, entries: &[CanonicalEntry]) -> Result<MergeSummary>;

    /// Records a cached copy of a file.
    async fn mark_as_downloaded(
        &self,
        file_id: &str,
        cache_location: &str,
        file_size: i64,
    ) -> Result<bool>;

    /// Bumps the download counter.
    async fn increment_download_count(&self, file_id: &str) -> Result<bool>;

    /// Applies field changes to an entry.
    async fn update_entry(&self, file_id: &str, update: &EntryUpdate) -> Result<bool>;

    /// Returns the most downloaded entries.
    async fn most_popular(&self, limit: u32) -> Result<Vec<LibraryEntry>>;
}

#[async_trait]
impl LibraryRepository for Library {
    async fn get(&self, file_id: &str) -> Result<Option<LibraryEntry>> {
        Library::get(self, file_id).await
    }

    async fn list(&self, query: &EntryQuery) -> Result<Vec<LibraryEntry>> {
        Library::list(self, query).await
    }

    async fn count(&self, filter: &EntryFilter) -> Result<i64> {
        Library::count(self, filter).await
    }

    async fn count_all(&self) -> Result<i64> {
        Library::count_all(self).await
    }

    async fn bulk_merge(&self, entries: &[CanonicalEntry]) -> Result<MergeSummary> {
        Library::bulk_merge(self, entries).await
    }

    async fn mark_as_downloaded(
        &self,
        file_id: &str,
        cache_location: &str,
        file_size: i64,
    ) -> Result<bool> {
        Library::mark_as_downloaded(self, file_id, cache_location, file_size).await
    }

    async fn increment_download_count(&self, file_id: &str) -> Result<bool> {
        Library::increment_download_count(self, file_id).await
    }

    async fn update_entry(&self, file_id: &str, update: &EntryUpdate) -> Result<bool> {
        Library::update_entry(self, file_id, update).await
    }

    async fn most_popular(&self, limit: u32) -> Result<Vec<LibraryEntry>> {
        Library::most_popular(self, limit).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::manifest::{SOURCE_UK_BIOBANK, Sex};

    fn entry(file_id: &str) -> CanonicalEntry {
        CanonicalEntry {
            file_id: file_id.to_string(),
            phenotype_code: "50".to_string(),
            display_name: "Standing height".to_string(),
            description: "Standing height".to_string(),
            showcase_link: String::new(),
            sex: Sex::Female,
            filename: file_id.to_string(),
            wget_command: format!("wget {file_id}"),
            aws_url: String::new(),
            dropbox_url: String::new(),
            checksum: String::new(),
            source: SOURCE_UK_BIOBANK.to_string(),
            file_size: None,
        }
    }

    async fn total(repo: &impl LibraryRepository) -> Result<i64> {
        repo.count_all().await
    }

    #[tokio::test]
    async fn test_library_repository_trait_delegates_merge_and_lookup() {
        let db = Database::new_in_memory().await.unwrap();
        let library = Library::new(db);

        let summary = LibraryRepository::bulk_merge(&library, &[entry("50.gwas.tsv.bgz")])
            .await
            .unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(total(&library).await.unwrap(), 1);

        let stored = LibraryRepository::get(&library, "50.gwas.tsv.bgz")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sex(), Sex::Female);
    }

    #[tokio::test]
    async fn test_library_repository_trait_object_mutators() {
        let db = Database::new_in_memory().await.unwrap();
        let library = Library::new(db);
        let repo: &dyn LibraryRepository = &library;

        repo.bulk_merge(&[entry("a.tsv")]).await.unwrap();
        assert!(repo.increment_download_count("a.tsv").await.unwrap());
        assert!(repo.mark_as_downloaded("a.tsv", "/cache/a.tsv", 10).await.unwrap());
        assert!(!repo.increment_download_count("missing.tsv").await.unwrap());

        let popular = repo.most_popular(5).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].download_count, 1);
        assert!(popular[0].downloaded);
    }
}
