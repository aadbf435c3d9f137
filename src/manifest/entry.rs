//! Canonical entry produced from one manifest row.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provenance marker written to every entry parsed from a manifest.
pub const SOURCE_UK_BIOBANK: &str = "UK Biobank";

/// Sentinel phenotype code used when the manifest has none.
pub const PHENOTYPE_CODE_UNKNOWN: &str = "N/A";

/// Descriptions up to this many characters are used verbatim as display names.
pub const DISPLAY_NAME_MAX_CHARS: usize = 60;

const ELLIPSIS: &str = "...";

/// Boilerplate prefixes dropped from long descriptions. First match wins.
const DISPLAY_NAME_PREFIXES: &[&str] = &[
    "Diagnoses - main ICD10: ",
    "Diagnoses - secondary ICD10: ",
    "Treatment/medication code: ",
];

/// Sex stratum of a GWAS result file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Pooled analysis (also the fallback for unrecognized values).
    #[default]
    BothSexes,
    /// Male-only analysis.
    Male,
    /// Female-only analysis.
    Female,
}

impl Sex {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BothSexes => "both_sexes",
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// Maps a free-form manifest value onto a stratum.
    ///
    /// Case and surrounding whitespace are ignored, inner spaces become
    /// underscores, and plurals collapse to the singular. Anything else is
    /// treated as [`Sex::BothSexes`].
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let cleaned = raw.trim().to_lowercase().replace(' ', "_");
        match cleaned.as_str() {
            "male" | "males" => Self::Male,
            "female" | "females" => Self::Female,
            _ => Self::BothSexes,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both_sexes" => Ok(Self::BothSexes),
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            _ => Err(format!("invalid sex: {s} (expected both_sexes, male or female)")),
        }
    }
}

/// A manifest row resolved into the library schema.
///
/// Carries identity and retrieval metadata only. Runtime state
/// (download flag, cache location, counters) belongs to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    /// Business key; always equal to `filename`.
    pub file_id: String,
    pub phenotype_code: String,
    /// Shortened description for listings.
    pub display_name: String,
    pub description: String,
    pub showcase_link: String,
    pub sex: Sex,
    pub filename: String,
    pub wget_command: String,
    pub aws_url: String,
    pub dropbox_url: String,
    /// MD5 checksum as published in the manifest.
    pub checksum: String,
    pub source: String,
    /// Unknown until the file is actually downloaded.
    pub file_size: Option<i64>,
}

impl CanonicalEntry {
    /// Returns true when at least one retrieval hint is present.
    #[must_use]
    pub fn has_download_method(&self) -> bool {
        !self.wget_command.is_empty() || !self.aws_url.is_empty() || !self.dropbox_url.is_empty()
    }
}

impl fmt::Display for CanonicalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}] {}",
            self.file_id, self.phenotype_code, self.sex, self.display_name
        )
    }
}

/// Derives the listing name for a description.
///
/// Short descriptions pass through. Longer ones lose a known boilerplate
/// prefix and, if still too long, are cut to 57 characters plus `...`.
/// Lengths are measured in characters.
#[must_use]
pub fn derive_display_name(description: &str) -> String {
    if description.chars().count() <= DISPLAY_NAME_MAX_CHARS {
        return description.to_string();
    }

    let display = DISPLAY_NAME_PREFIXES
        .iter()
        .find_map(|prefix| description.strip_prefix(prefix))
        .unwrap_or(description);

    if display.chars().count() <= DISPLAY_NAME_MAX_CHARS {
        return display.to_string();
    }

    let keep = DISPLAY_NAME_MAX_CHARS - ELLIPSIS.len();
    let mut truncated: String = display.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
