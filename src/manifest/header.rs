//! Column header normalization.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("valid non-word regex"));

#[allow(clippy::expect_used)]
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid underscore regex"));

/// Maps raw header text to a snake-case token.
///
/// `"Phenotype Description"` becomes `phenotype_description`,
/// `"UK Biobank Data Showcase Link"` becomes `uk_biobank_data_showcase_link`.
/// A leading byte-order mark is a non-word character and disappears with
/// the surrounding punctuation.
#[must_use]
pub fn normalize_header(header: &str) -> String {
    let lowered = header.trim().to_lowercase();
    let replaced = NON_WORD_RUN.replace_all(&lowered, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}
