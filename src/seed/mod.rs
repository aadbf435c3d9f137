//! Startup seeding of the library and phenotype catalog.
//!
//! Seeding is best-effort: a missing file or an already-populated store is a
//! skip, and any failure is logged and reported as [`SeedOutcome::Failed`].
//! Nothing here returns `Err` or panics, so callers can run it
//! unconditionally at startup.
//!
//! The "store is empty" check is only a soft guard. Two seeders racing on an
//! empty store both proceed; the unique keys make the loser's inserts skips.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{CatalogError, PhenotypeCatalog, load_catalog_records};
use crate::library::{Library, LibraryError, LibraryRepository, MergeSummary};
use crate::manifest::{ManifestError, ManifestParser, validate_entries};

/// Number of rejected entries logged individually at debug level.
const LOGGED_ISSUE_LIMIT: usize = 5;

/// Internal seeding failures, converted to [`SeedOutcome::Failed`].
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The blocking parse task panicked or was cancelled.
    #[error("seeding task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a seeding step did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No path configured, or the file does not exist.
    FileMissing,
    /// The target store already holds rows.
    AlreadySeeded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileMissing => write!(f, "source file missing"),
            Self::AlreadySeeded => write!(f, "already seeded"),
        }
    }
}

/// Result of one seeding step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeedOutcome {
    Skipped { reason: SkipReason },
    Seeded { summary: MergeSummary },
    Failed { message: String },
}

impl SeedOutcome {
    /// Returns true if the step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for SeedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::Seeded { summary } => write!(
                f,
                "seeded ({} added, {} skipped)",
                summary.inserted, summary.skipped
            ),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Outcomes of a full startup seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub gwas_library: SeedOutcome,
    pub phenotypes: SeedOutcome,
}

impl SeedReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.gwas_library.is_failed() || self.phenotypes.is_failed()
    }
}

fn existing_file(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| p.is_file())
}

/// Seeds the GWAS library from a manifest file if the library is empty.
///
/// Parsing and validation run on the blocking pool. Only validated entries
/// are merged.
#[instrument(skip(library))]
pub async fn seed_gwas_library<R>(library: &R, manifest_path: Option<&Path>) -> SeedOutcome
where
    R: LibraryRepository + ?Sized,
{
    let Some(path) = existing_file(manifest_path) else {
        warn!(path = ?manifest_path, "GWAS manifest not found, skipping library seed");
        return SeedOutcome::Skipped {
            reason: SkipReason::FileMissing,
        };
    };

    match try_seed_gwas_library(library, path).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, path = %path.display(), "GWAS library seed failed");
            SeedOutcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

async fn try_seed_gwas_library<R>(library: &R, path: &Path) -> Result<SeedOutcome, SeedError>
where
    R: LibraryRepository + ?Sized,
{
    if library.count_all().await? > 0 {
        info!("GWAS library already seeded, skipping");
        return Ok(SeedOutcome::Skipped {
            reason: SkipReason::AlreadySeeded,
        });
    }

    info!(path = %path.display(), "Seeding GWAS library");
    let owned = path.to_path_buf();
    let (parsed, validation) = tokio::task::spawn_blocking(move || {
        let parsed = ManifestParser::new().parse_path(&owned)?;
        let validation = validate_entries(&parsed.entries);
        Ok::<_, ManifestError>((parsed, validation))
    })
    .await??;

    let report = &validation.report;
    info!(
        rows = parsed.len(),
        row_errors = parsed.row_errors.len(),
        valid = report.valid,
        invalid = report.invalid,
        "Validated GWAS manifest"
    );
    for rejected in report.issues.iter().take(LOGGED_ISSUE_LIMIT) {
        let issues: Vec<String> = rejected.issues.iter().map(ToString::to_string).collect();
        debug!(file_id = %rejected.file_id, issues = %issues.join("; "), "Rejected manifest entry");
    }

    if validation.valid.is_empty() {
        warn!("No valid GWAS entries to seed");
        return Ok(SeedOutcome::Seeded {
            summary: MergeSummary::default(),
        });
    }

    let summary = library.bulk_merge(&validation.valid).await?;
    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "GWAS library seed complete"
    );
    Ok(SeedOutcome::Seeded { summary })
}

/// Seeds the phenotype catalog from a JSON file if the catalog is empty.
#[instrument(skip(catalog))]
pub async fn seed_phenotypes(catalog: &PhenotypeCatalog, catalog_path: Option<&Path>) -> SeedOutcome {
    let Some(path) = existing_file(catalog_path) else {
        warn!(path = ?catalog_path, "Phenotype catalog not found, skipping catalog seed");
        return SeedOutcome::Skipped {
            reason: SkipReason::FileMissing,
        };
    };

    match try_seed_phenotypes(catalog, path).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, path = %path.display(), "Phenotype seed failed");
            SeedOutcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

async fn try_seed_phenotypes(
    catalog: &PhenotypeCatalog,
    path: &Path,
) -> Result<SeedOutcome, SeedError> {
    if catalog.count().await? > 0 {
        info!("Phenotypes already seeded, skipping");
        return Ok(SeedOutcome::Skipped {
            reason: SkipReason::AlreadySeeded,
        });
    }

    info!(path = %path.display(), "Seeding phenotypes");
    let owned = path.to_path_buf();
    let records = tokio::task::spawn_blocking(move || load_catalog_records(&owned)).await??;

    let summary = catalog.bulk_create(&records).await?;
    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Phenotype seed complete"
    );
    Ok(SeedOutcome::Seeded { summary })
}

/// Bundles both stores and their source files behind one startup trigger.
#[derive(Debug, Clone)]
pub struct Seeder<R = Library> {
    library: R,
    catalog: PhenotypeCatalog,
    manifest_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
}

impl<R: LibraryRepository> Seeder<R> {
    #[must_use]
    pub fn new(library: R, catalog: PhenotypeCatalog) -> Self {
        Self {
            library,
            catalog,
            manifest_path: None,
            catalog_path: None,
        }
    }

    #[must_use]
    pub fn manifest_path(mut self, path: Option<PathBuf>) -> Self {
        self.manifest_path = path;
        self
    }

    #[must_use]
    pub fn catalog_path(mut self, path: Option<PathBuf>) -> Self {
        self.catalog_path = path;
        self
    }

    /// Seeds the library, then the catalog.
    pub async fn seed_all(&self) -> SeedReport {
        let gwas_library = seed_gwas_library(&self.library, self.manifest_path.as_deref()).await;
        let phenotypes = seed_phenotypes(&self.catalog, self.catalog_path.as_deref()).await;
        SeedReport {
            gwas_library,
            phenotypes,
        }
    }
}
