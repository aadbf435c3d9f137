//! Stored library entries, queries and updates.

use std::fmt;

use serde::Serialize;
use sqlx::FromRow;

use crate::manifest::Sex;

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Default size of the most-popular ranking.
pub const DEFAULT_POPULAR_LIMIT: u32 = 10;

/// A library row: manifest metadata plus runtime download state.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct LibraryEntry {
    /// Unique business key (the manifest filename).
    pub file_id: String,
    pub phenotype_code: String,
    pub display_name: String,
    pub description: String,
    pub showcase_link: String,
    /// Sex stratum as stored (parsed via `sex()`).
    #[sqlx(rename = "sex")]
    #[serde(rename = "sex")]
    pub sex_str: String,
    pub filename: String,
    pub wget_command: String,
    pub aws_url: String,
    pub dropbox_url: String,
    pub checksum: String,
    pub source: String,
    /// Size in bytes, known once downloaded.
    pub file_size: Option<i64>,
    /// Whether a copy is held in the cache.
    pub downloaded: bool,
    /// Where the cached copy lives.
    pub cache_location: Option<String>,
    /// Number of times the file was served.
    pub download_count: i64,
    pub last_accessed: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl LibraryEntry {
    /// Returns the parsed sex stratum.
    ///
    /// Falls back to `BothSexes` if the stored string is invalid.
    #[must_use]
    pub fn sex(&self) -> Sex {
        self.sex_str.parse().unwrap_or_default()
    }
}

impl fmt::Display for LibraryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}] {} (downloads: {}{})",
            self.file_id,
            self.phenotype_code,
            self.sex_str,
            self.display_name,
            self.download_count,
            if self.downloaded { ", cached" } else { "" }
        )
    }
}

/// Outcome of a bulk merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Entries that did not exist and were created.
    pub inserted: u64,
    /// Entries whose `file_id` already existed; left untouched.
    pub skipped: u64,
}

/// Filter shared by listing and counting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Full-text terms; an entry matches if any token matches.
    pub search: Option<String>,
    pub sex: Option<Sex>,
}

impl EntryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    #[must_use]
    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    /// Builds the FTS5 `MATCH` expression for the search term.
    ///
    /// Returns `None` when there is no search term (or it is blank), and
    /// `Some("")` when the term has text but no searchable tokens; callers
    /// treat the latter as "matches nothing".
    #[must_use]
    pub fn match_expression(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let tokens: Vec<String> = term
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(|token| format!("\"{}\"", token.to_lowercase()))
            .collect();
        Some(tokens.join(" OR "))
    }
}

/// A paginated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub filter: EntryFilter,
    /// Maximum rows to return; `0` means no limit.
    pub limit: u32,
    pub offset: u32,
}

impl Default for EntryQuery {
    fn default() -> Self {
        Self {
            filter: EntryFilter::default(),
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl EntryQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.filter = self.filter.search(term);
        self
    }

    #[must_use]
    pub fn sex(mut self, sex: Sex) -> Self {
        self.filter = self.filter.sex(sex);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// SQLite `LIMIT` value (`-1` is unbounded).
    pub(crate) fn sql_limit(&self) -> i64 {
        if self.limit == 0 {
            -1
        } else {
            i64::from(self.limit)
        }
    }
}

/// Field changes for [`crate::Library::update_entry`].
///
/// Identity fields (`file_id`, `filename`, `phenotype_code`, `source`) are
/// deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub showcase_link: Option<String>,
    pub checksum: Option<String>,
    pub file_size: Option<i64>,
    pub downloaded: Option<bool>,
    pub cache_location: Option<String>,
}

impl EntryUpdate {
    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.description.is_none()
            && self.showcase_link.is_none()
            && self.checksum.is_none()
            && self.file_size.is_none()
            && self.downloaded.is_none()
            && self.cache_location.is_none()
    }
}
