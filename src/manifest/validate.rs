//! Post-parse validation of candidate entries.
//!
//! Enforces the cross-row invariants the parser cannot see on its own:
//! filename presence, first-occurrence-wins uniqueness within a batch, and
//! the requirement that every entry can actually be retrieved.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

use super::entry::CanonicalEntry;

/// Why an entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// `filename` is empty.
    MissingFilename,
    /// An earlier entry in the batch already used this filename.
    DuplicateFilename(String),
    /// None of `wget_command`, `aws_url`, `dropbox_url` is set.
    NoDownloadMethod,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFilename => write!(f, "Missing filename"),
            Self::DuplicateFilename(name) => write!(f, "Duplicate filename: {name}"),
            Self::NoDownloadMethod => write!(
                f,
                "No download method available (wget_command, aws_url, or dropbox_url)"
            ),
        }
    }
}

impl Serialize for ValidationIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Issues recorded for one rejected entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    pub file_id: String,
    pub phenotype_code: String,
    pub issues: Vec<ValidationIssue>,
}

/// Aggregate outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// One record per rejected entry, in input order.
    pub issues: Vec<RejectedEntry>,
}

/// Entries split by validity, plus the report describing the split.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub valid: Vec<CanonicalEntry>,
    pub invalid: Vec<CanonicalEntry>,
    pub report: ValidationReport,
}

/// Validates a parsed batch.
///
/// Checks run in order for every entry and all failures are collected.
/// Only filenames that pass the presence check are remembered, so the first
/// occurrence of a filename is the one that can be accepted.
#[must_use]
pub fn validate_entries(entries: &[CanonicalEntry]) -> Validation {
    let mut validation = Validation::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for entry in entries {
        let mut issues = Vec::new();

        if entry.filename.is_empty() {
            issues.push(ValidationIssue::MissingFilename);
        } else if !seen.insert(entry.filename.as_str()) {
            issues.push(ValidationIssue::DuplicateFilename(entry.filename.clone()));
        }

        if !entry.has_download_method() {
            issues.push(ValidationIssue::NoDownloadMethod);
        }

        if issues.is_empty() {
            validation.valid.push(entry.clone());
        } else {
            validation.report.issues.push(RejectedEntry {
                file_id: entry.file_id.clone(),
                phenotype_code: entry.phenotype_code.clone(),
                issues,
            });
            validation.invalid.push(entry.clone());
        }
    }

    validation.report.total = entries.len();
    validation.report.valid = validation.valid.len();
    validation.report.invalid = validation.invalid.len();
    validation
}
