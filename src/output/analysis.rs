//! The dashboard analysis
//!
//! Ten questions about the stored applicants, answered in one pass over the
//! store. Term-scoped questions use the configured analysis term.

use crate::storage::{
    DegreeOutcomeGpa, MetricAverage, RunRecord, Storage, StorageResult, UniversityAcceptance,
};
use serde::Serialize;

/// Smallest group counted in the per-university acceptance comparison
pub const MIN_GROUP_APPLICATIONS: u32 = 5;

const INTERNATIONAL: &str = "International";
const AMERICAN: &str = "American";

/// Answers to the dashboard questions
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// Term the term-scoped answers refer to, e.g. "Fall 2025"
    pub term: String,
    pub total_applicants: u64,

    /// Entries for the analysis term
    pub term_applications: u64,

    /// Share of all entries from international applicants
    pub international_percentage: Option<f64>,

    /// GPA and GRE averages among entries that report them
    pub metric_averages: Vec<MetricAverage>,

    pub american_term_gpa: Option<f64>,
    pub term_acceptance_percentage: Option<f64>,
    pub accepted_term_gpa: Option<f64>,

    /// Johns Hopkins masters entries
    pub jhu_masters_entries: u64,

    /// Georgetown PhD acceptances in the analysis term's year
    pub georgetown_phd_acceptances: u64,

    pub university_acceptance: Vec<UniversityAcceptance>,
    pub gpa_by_degree: Vec<DegreeOutcomeGpa>,

    #[serde(skip)]
    pub latest_run: Option<RunRecord>,
}

/// Runs every analysis query
///
/// # Arguments
///
/// * `storage` - The store to query
/// * `term` - Admission term for the term-scoped questions
pub fn load_analysis(storage: &dyn Storage, term: &str) -> StorageResult<Analysis> {
    Ok(Analysis {
        term: term.to_string(),
        total_applicants: storage.count_applicants()?,
        term_applications: storage.count_by_term(term)?,
        international_percentage: storage.category_percentage(INTERNATIONAL)?,
        metric_averages: storage.metric_averages()?,
        american_term_gpa: storage.average_gpa(term, Some(AMERICAN), false)?,
        term_acceptance_percentage: storage.acceptance_percentage(term)?,
        accepted_term_gpa: storage.average_gpa(term, None, true)?,
        jhu_masters_entries: storage.count_entries(
            "Johns Hopkins University",
            "Masters",
            None,
            None,
        )?,
        georgetown_phd_acceptances: storage.count_entries(
            "Georgetown",
            "PhD",
            Some("accept"),
            Some(term_year(term)),
        )?,
        university_acceptance: storage.acceptance_by_university(MIN_GROUP_APPLICATIONS)?,
        gpa_by_degree: storage.gpa_by_degree_and_outcome()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// The year part of a term like "Fall 2025"; the whole term otherwise
fn term_year(term: &str) -> &str {
    term.split_whitespace()
        .rev()
        .find(|part| part.len() == 4 && part.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(term)
}

/// Renders a percentage with two decimals, e.g. "25.50%"
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2}%", value),
        None => "n/a".to_string(),
    }
}

/// Renders an average with two decimals
pub fn format_average(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2}", value),
        None => "n/a".to_string(),
    }
}
