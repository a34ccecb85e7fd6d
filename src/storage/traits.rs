//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::extract::ApplicantRecord;
use crate::storage::{
    DegreeOutcomeGpa, MetricAverage, RunCounts, RunRecord, UniversityAcceptance,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes take `&mut self`; callers sharing a backend wrap it in a mutex and
/// hold the lock for a single call.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new ingest run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed and records its counts
    fn complete_run(&mut self, run_id: i64, counts: &RunCounts) -> StorageResult<()>;

    /// Marks a run as failed with the error that ended it
    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()>;

    // ===== Applicants =====

    /// Inserts one applicant row
    ///
    /// There is no uniqueness constraint: inserting the same record twice
    /// produces two rows.
    fn insert_applicant(&mut self, record: &ApplicantRecord) -> StorageResult<i64>;

    /// Collects the result ids embedded in stored locators
    ///
    /// # Arguments
    ///
    /// * `detail_marker` - Path fragment preceding the id, e.g. `/result/`
    fn existing_result_ids(&self, detail_marker: &str) -> StorageResult<HashSet<u64>>;

    /// Drops and recreates the applicants table
    fn reset_applicants(&mut self) -> StorageResult<()>;

    /// Counts stored applicant rows
    fn count_applicants(&self) -> StorageResult<u64>;

    // ===== Analytics =====

    /// Counts rows whose term equals `term`
    fn count_by_term(&self, term: &str) -> StorageResult<u64>;

    /// Share of all rows whose applicant category equals `category`, in
    /// percent rounded to two places; `None` when the table is empty
    fn category_percentage(&self, category: &str) -> StorageResult<Option<f64>>;

    /// Averages of GPA and the three GRE scores among rows providing them
    fn metric_averages(&self) -> StorageResult<Vec<MetricAverage>>;

    /// Average GPA for a term, optionally narrowed to one applicant category
    /// and to accepted entries
    fn average_gpa(
        &self,
        term: &str,
        category: Option<&str>,
        accepted_only: bool,
    ) -> StorageResult<Option<f64>>;

    /// Percentage of a term's entries whose status mentions an acceptance
    fn acceptance_percentage(&self, term: &str) -> StorageResult<Option<f64>>;

    /// Counts entries by standardized university (substring), exact degree,
    /// and optional status and term substrings
    fn count_entries(
        &self,
        university: &str,
        degree: &str,
        status: Option<&str>,
        term: Option<&str>,
    ) -> StorageResult<u64>;

    /// Acceptance rates of American and International applicants per
    /// standardized university
    ///
    /// Only groups with at least `min_applications` entries count, and a
    /// university appears only when both groups qualify. Ordered by the
    /// International minus American difference, largest first.
    fn acceptance_by_university(
        &self,
        min_applications: u32,
    ) -> StorageResult<Vec<UniversityAcceptance>>;

    /// Average GPA grouped by degree and admission outcome
    fn gpa_by_degree_and_outcome(&self) -> StorageResult<Vec<DegreeOutcomeGpa>>;
}
