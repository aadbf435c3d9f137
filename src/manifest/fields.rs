//! Alias-table field resolution.
//!
//! Every canonical field is looked up through an ordered list of accepted
//! (normalized) column names. Supporting a new manifest dialect means adding
//! aliases here, not new parsing code.

use std::collections::HashMap;

use super::entry::PHENOTYPE_CODE_UNKNOWN;

/// One manifest row keyed by normalized header.
pub type NormalizedRow = HashMap<String, String>;

/// Canonical fields read from a manifest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PhenotypeCode,
    Description,
    Sex,
    ShowcaseLink,
    Filename,
    WgetCommand,
    AwsUrl,
    DropboxUrl,
    Checksum,
}

/// Resolution rule for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    /// Candidate normalized column names, most specific first.
    pub aliases: &'static [&'static str],
    /// Value used when no alias yields a non-empty cell.
    pub default: &'static str,
}

/// The alias table. Description has no static default: it is synthesized
/// from the phenotype code by the parser.
pub const FIELD_TABLE: &[FieldSpec] = &[
    FieldSpec {
        field: Field::PhenotypeCode,
        aliases: &["phenotype_code", "phenotype", "code", "field_id", "field"],
        default: PHENOTYPE_CODE_UNKNOWN,
    },
    FieldSpec {
        field: Field::Description,
        aliases: &["phenotype_description", "description", "trait", "phenotype_name"],
        default: "",
    },
    FieldSpec {
        field: Field::Sex,
        aliases: &["sex", "gender"],
        default: "both_sexes",
    },
    FieldSpec {
        field: Field::ShowcaseLink,
        aliases: &[
            "uk_biobank_data_showcase_link",
            "showcase_link",
            "data_showcase_link",
            "link",
        ],
        default: "",
    },
    FieldSpec {
        field: Field::Filename,
        aliases: &["file", "filename"],
        default: "",
    },
    FieldSpec {
        field: Field::WgetCommand,
        aliases: &["wget_command", "wget"],
        default: "",
    },
    FieldSpec {
        field: Field::AwsUrl,
        aliases: &["aws_file", "aws_url", "aws", "s3_url"],
        default: "",
    },
    FieldSpec {
        field: Field::DropboxUrl,
        aliases: &["dropbox_file", "dropbox_url", "dropbox"],
        default: "",
    },
    FieldSpec {
        field: Field::Checksum,
        aliases: &["md5s", "md5", "checksum"],
        default: "",
    },
];

impl Field {
    /// Returns the table rule for this field.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        // Table rows are in variant declaration order.
        &FIELD_TABLE[self as usize]
    }
}

/// Returns the first non-blank value among `aliases`, trimmed, else `default`.
#[must_use]
pub fn resolve(row: &NormalizedRow, aliases: &[&str], default: &str) -> String {
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Resolves `field` through its table rule.
#[must_use]
pub fn resolve_field(row: &NormalizedRow, field: Field) -> String {
    let spec = field.spec();
    resolve(row, spec.aliases, spec.default)
}
