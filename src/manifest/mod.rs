//! Manifest parsing for GWAS summary-statistics catalogs.
//!
//! A manifest is a delimited text file (tab- or comma-separated, detected
//! automatically) whose first line names the columns and whose every other
//! line describes one downloadable result file. Column names vary between
//! releases, so headers are normalized once and fields are looked up through
//! the alias table in [`fields`].
//!
//! # Example
//!
//! ```
//! use gwas_library::manifest::{ManifestParser, validate_entries};
//!
//! let manifest = "Phenotype Code\tPhenotype Description\tFile\tAWS File\n\
//!                 50\tStanding height\t50.gwas.tsv\ts3://bucket/50.gwas.tsv\n";
//! let parsed = ManifestParser::new().parse_str(manifest).unwrap();
//! let validation = validate_entries(&parsed.entries);
//! assert_eq!(validation.report.valid, 1);
//! ```

mod entry;
mod error;
pub mod fields;
mod header;
mod validate;

pub use entry::{
    CanonicalEntry, DISPLAY_NAME_MAX_CHARS, PHENOTYPE_CODE_UNKNOWN, SOURCE_UK_BIOBANK, Sex,
    derive_display_name,
};
pub use error::{ManifestError, RowParseError};
pub use fields::{FIELD_TABLE, Field, FieldSpec, NormalizedRow, resolve, resolve_field};
pub use header::normalize_header;
pub use validate::{RejectedEntry, Validation, ValidationIssue, ValidationReport, validate_entries};

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, info, instrument, warn};

/// Number of leading bytes inspected to pick the delimiter.
pub const DELIMITER_SAMPLE_BYTES: u64 = 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Result of parsing one manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestParse {
    /// Normalized header names, in column order.
    pub headers: Vec<String>,
    /// Entries in source row order. May contain repeated filenames.
    pub entries: Vec<CanonicalEntry>,
    /// Rows dropped because they could not be decoded.
    pub row_errors: Vec<RowParseError>,
    /// Rows dropped because no filename column had a value.
    pub rows_without_filename: usize,
}

impl ManifestParse {
    /// Returns count of parsed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Streaming manifest parser.
///
/// The parser is stateless between calls; one instance can parse any
/// number of manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestParser;

impl ManifestParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotFound`] if the path does not exist,
    /// [`ManifestError::Format`] if there is no header row, and
    /// [`ManifestError::Io`] / [`ManifestError::Csv`] on read failures.
    /// Individual bad rows never fail the parse.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn parse_path(&self, path: &Path) -> Result<ManifestParse, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        self.parse_reader(file)
    }

    /// Parses manifest text already held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`ManifestParser::parse_reader`].
    pub fn parse_str(&self, input: &str) -> Result<ManifestParse, ManifestError> {
        self.parse_reader(input.as_bytes())
    }

    /// Parses a manifest from any reader.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Format`] if there is no header row and
    /// [`ManifestError::Io`] / [`ManifestError::Csv`] on read failures.
    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<ManifestParse, ManifestError> {
        let mut sample = Vec::new();
        reader
            .by_ref()
            .take(DELIMITER_SAMPLE_BYTES)
            .read_to_end(&mut sample)?;
        // csv skips blank lines, which would promote the first data row to header.
        if starts_with_blank_line(&sample) {
            return Err(ManifestError::no_headers());
        }
        let delimiter = sniff_delimiter(&sample);
        debug!(delimiter = %char::from(delimiter).escape_default(), "Detected delimiter");

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(io::Cursor::new(sample).chain(reader));

        let raw_headers = csv_reader.byte_headers()?.clone();
        let headers: Vec<String> = raw_headers
            .iter()
            .map(|raw| normalize_header(&String::from_utf8_lossy(raw)))
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(ManifestError::no_headers());
        }
        info!(headers = ?headers, "Found manifest headers");

        let mut result = ManifestParse {
            headers,
            ..ManifestParse::default()
        };

        let mut record = csv::ByteRecord::new();
        let mut row_index: u64 = 0;
        loop {
            row_index += 1;
            // Header is line 1; fall back to a row count when the reader has no position.
            let fallback_line = row_index + 1;
            match csv_reader.read_byte_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {
                    let line = record.position().map_or(fallback_line, csv::Position::line);
                    match normalize_row(&result.headers, &record, line) {
                        Ok(row) => match entry_from_row(&row) {
                            Some(entry) => result.entries.push(entry),
                            None => {
                                debug!(line, "Skipping row with missing filename");
                                result.rows_without_filename += 1;
                            }
                        },
                        Err(row_error) => {
                            warn!(line, error = %row_error, "Error parsing manifest row");
                            result.row_errors.push(row_error);
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(
            entries = result.entries.len(),
            row_errors = result.row_errors.len(),
            without_filename = result.rows_without_filename,
            "Parsed manifest"
        );

        Ok(result)
    }
}

/// Parses the manifest at `path` and returns its entries in row order.
///
/// # Errors
///
/// See [`ManifestParser::parse_path`].
pub fn parse_manifest(path: &Path) -> Result<Vec<CanonicalEntry>, ManifestError> {
    ManifestParser::new()
        .parse_path(path)
        .map(|parsed| parsed.entries)
}

/// Tab if the sample contains one, otherwise comma.
#[must_use]
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    if sample.contains(&b'\t') { b'\t' } else { b',' }
}

/// True when the first line of `sample` (after an optional UTF-8 BOM) is empty.
fn starts_with_blank_line(sample: &[u8]) -> bool {
    let sample = sample.strip_prefix(UTF8_BOM).unwrap_or(sample);
    matches!(sample.first(), Some(b'\n' | b'\r'))
}

/// Pairs each cell with its normalized header.
///
/// Missing trailing cells are simply absent; surplus cells are ignored.
/// When two headers normalize to the same key the later column wins.
fn normalize_row(
    headers: &[String],
    record: &csv::ByteRecord,
    line: u64,
) -> Result<NormalizedRow, RowParseError> {
    let mut row = NormalizedRow::with_capacity(headers.len());
    for (column, (key, raw)) in headers.iter().zip(record.iter()).enumerate() {
        if key.is_empty() {
            continue;
        }
        let value = std::str::from_utf8(raw).map_err(|err| {
            RowParseError::new(
                line,
                format!("invalid UTF-8 in column {} ({key}): {err}", column + 1),
            )
        })?;
        row.insert(key.clone(), value.to_string());
    }
    Ok(row)
}

/// Resolves one normalized row. Returns `None` when the row has no filename.
fn entry_from_row(row: &NormalizedRow) -> Option<CanonicalEntry> {
    let filename = resolve_field(row, Field::Filename);
    if filename.is_empty() {
        return None;
    }

    let phenotype_code = resolve_field(row, Field::PhenotypeCode);
    let mut description = resolve_field(row, Field::Description);
    if description.is_empty() {
        description = format!("Phenotype {phenotype_code}");
    }
    let display_name = derive_display_name(&description);
    let sex = Sex::normalize(&resolve_field(row, Field::Sex));

    Some(CanonicalEntry {
        file_id: filename.clone(),
        phenotype_code,
        display_name,
        description,
        showcase_link: resolve_field(row, Field::ShowcaseLink),
        sex,
        filename,
        wget_command: resolve_field(row, Field::WgetCommand),
        aws_url: resolve_field(row, Field::AwsUrl),
        dropbox_url: resolve_field(row, Field::DropboxUrl),
        checksum: resolve_field(row, Field::Checksum),
        source: SOURCE_UK_BIOBANK.to_string(),
        file_size: None,
    })
}
