//! GWAS Library Core
//!
//! This library ingests manifests of downloadable genome-wide association
//! study (GWAS) summary-statistics files and idempotently synchronizes them
//! into a queryable `SQLite` store, tracking per-entry download state.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`manifest`] - Manifest parsing, field resolution and validation
//! - [`library`] - GWAS library store (merge, query, runtime state)
//! - [`catalog`] - Phenotype catalog store
//! - [`seed`] - Best-effort startup seeding of both stores

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod db;
pub mod library;
pub mod manifest;
pub mod seed;

// Re-export commonly used types
pub use catalog::{CatalogError, PhenotypeCatalog, PhenotypeRecord, load_catalog_records};
pub use db::{Database, DatabaseOptions, DbError};
pub use library::{
    DEFAULT_LIST_LIMIT, DEFAULT_POPULAR_LIMIT, DbErrorKind, EntryFilter, EntryQuery, EntryUpdate,
    Library, LibraryEntry, LibraryError, LibraryRepository, MergeSummary,
};
pub use manifest::{
    CanonicalEntry, ManifestError, ManifestParse, ManifestParser, RejectedEntry, Sex,
    ValidationIssue, ValidationReport, parse_manifest, validate_entries,
};
pub use seed::{SeedError, SeedOutcome, SeedReport, Seeder, SkipReason, seed_gwas_library, seed_phenotypes};
