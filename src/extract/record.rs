//! The applicant record produced by extraction
//!
//! Every field is optional. `None` is the missing marker and serializes as
//! JSON `null`; extracted text that is empty after trimming is never stored
//! as `Some("")`.

use serde::{Deserialize, Serialize};

/// One applicant entry from the survey listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    /// Program and institution combined for display, see [`combine_program`]
    pub program: Option<String>,

    /// Institution name as shown in the listing
    pub university: Option<String>,

    /// Free-text commentary from the row following the detail row
    pub comments: Option<String>,

    /// Date the entry was added to the forum, loosely formatted
    pub date_added: Option<String>,

    /// Absolute detail-page locator carrying the numeric result id
    pub url: Option<String>,

    /// e.g. "Accepted on 12 Mar"
    pub status: Option<String>,

    /// Season and year, e.g. "Fall 2025"
    #[serde(rename = "Term")]
    pub term: Option<String>,

    /// "International" or "American"
    #[serde(rename = "US/International")]
    pub us_or_international: Option<String>,

    pub gre: Option<String>,
    pub gre_v: Option<String>,
    pub gre_aw: Option<String>,

    /// Degree level, e.g. "Masters" or "PhD"
    #[serde(rename = "Degree")]
    pub degree: Option<String>,

    pub gpa: Option<String>,

    /// Standardized program name supplied by the enrichment command
    #[serde(rename = "llm-generated-program", default)]
    pub llm_generated_program: Option<String>,

    /// Standardized institution name supplied by the enrichment command
    #[serde(rename = "llm-generated-university", default)]
    pub llm_generated_university: Option<String>,
}

impl ApplicantRecord {
    /// Extracts the numeric result id from the record's locator
    pub fn result_id(&self, detail_marker: &str) -> Option<u64> {
        self.url
            .as_deref()
            .and_then(|url| super::ids::detail_id(url, detail_marker))
    }
}

/// Builds the display program string from its two parts
///
/// "program, institution" when both are present, whichever one is present
/// otherwise, and missing when neither is.
pub fn combine_program(program: Option<&str>, institution: Option<&str>) -> Option<String> {
    match (program, institution) {
        (Some(program), Some(institution)) => Some(format!("{}, {}", program, institution)),
        (Some(program), None) => Some(program.to_string()),
        (None, Some(institution)) => Some(institution.to_string()),
        (None, None) => None,
    }
}

/// Trims text and maps an empty result to the missing marker
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
