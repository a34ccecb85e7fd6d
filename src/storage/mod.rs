//! Storage module for persisting harvested data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Insert-only applicant persistence
//! - Ingest run tracking
//! - The aggregate queries behind the analysis report

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Represents an ingest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub error_message: Option<String>,
}

/// What one ingest run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    /// Listing pages that linked at least one new result
    pub pages_with_new_data: u32,
    pub records_extracted: u32,
    pub records_inserted: u32,
}

/// Status of an ingest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Average of one score column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricAverage {
    pub metric: String,
    pub count_with_data: u64,
    pub average: Option<f64>,
}

/// Acceptance rates of the two applicant categories at one university
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniversityAcceptance {
    pub university: String,
    pub american_rate: f64,
    pub international_rate: f64,
    pub rate_difference: f64,
}

/// Average GPA of one degree and outcome group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegreeOutcomeGpa {
    pub degree: String,
    /// "Accepted", "Rejected" or "Other"
    pub outcome: String,
    pub count: u64,
    pub average_gpa: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }
}
