//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Text matching in the analytics queries uses `LIKE`, which SQLite treats
//! case-insensitively for ASCII.

use crate::extract::{leading_detail_id, ApplicantRecord};
use crate::storage::schema::{initialize_schema, recreate_applicants};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    DegreeOutcomeGpa, MetricAverage, RunCounts, RunRecord, RunStatus, UniversityAcceptance,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, \
     pages_with_new_data, records_extracted, records_inserted, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn run_from_row(row: &Row) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        counts: RunCounts {
            pages_with_new_data: row.get(5)?,
            records_extracted: row.get(6)?,
            records_inserted: row.get(7)?,
        },
        error_message: row.get(8)?,
    })
}

/// Parses an extracted score into a number; anything unparseable is NULL
fn parse_number(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|number| number.is_finite())
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO ingest_runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let query = format!("SELECT {} FROM ingest_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&query, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let query = format!(
            "SELECT {} FROM ingest_runs ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self.conn.query_row(&query, [], run_from_row).optional()?;
        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, counts: &RunCounts) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE ingest_runs
             SET status = ?1, finished_at = ?2, pages_with_new_data = ?3,
                 records_extracted = ?4, records_inserted = ?5
             WHERE id = ?6",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                counts.pages_with_new_data,
                counts.records_extracted,
                counts.records_inserted,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE ingest_runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![RunStatus::Failed.to_db_string(), now, error_message, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Applicants =====

    fn insert_applicant(&mut self, record: &ApplicantRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO applicants (
                program, university, comments, date_added, url, status, term,
                us_or_international, gpa, gre, gre_v, gre_aw, degree,
                llm_generated_program, llm_generated_university
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.program,
                record.university,
                record.comments,
                record.date_added,
                record.url,
                record.status,
                record.term,
                record.us_or_international,
                parse_number(&record.gpa),
                parse_number(&record.gre),
                parse_number(&record.gre_v),
                parse_number(&record.gre_aw),
                record.degree,
                record.llm_generated_program,
                record.llm_generated_university,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn existing_result_ids(&self, detail_marker: &str) -> StorageResult<HashSet<u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM applicants WHERE url LIKE '%' || ?1 || '%'")?;

        let rows = stmt.query_map(params![detail_marker], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            if let Some(id) = leading_detail_id(&row?, detail_marker) {
                ids.insert(id);
            }
        }

        Ok(ids)
    }

    fn reset_applicants(&mut self) -> StorageResult<()> {
        recreate_applicants(&self.conn)?;
        Ok(())
    }

    fn count_applicants(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM applicants", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Analytics =====

    fn count_by_term(&self, term: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM applicants WHERE term = ?1",
            params![term],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn category_percentage(&self, category: &str) -> StorageResult<Option<f64>> {
        let percentage = self.conn.query_row(
            "SELECT ROUND(
                (SELECT COUNT(*) FROM applicants WHERE us_or_international = ?1) * 100.0
                    / (SELECT COUNT(*) FROM applicants),
                2
            )",
            params![category],
            |row| row.get(0),
        )?;
        Ok(percentage)
    }

    fn metric_averages(&self) -> StorageResult<Vec<MetricAverage>> {
        let query = "
            SELECT 'GPA', COUNT(gpa), ROUND(AVG(gpa), 2)
            FROM applicants WHERE gpa IS NOT NULL AND gpa <= 5
            UNION ALL
            SELECT 'GRE', COUNT(gre), ROUND(AVG(gre), 2)
            FROM applicants WHERE gre IS NOT NULL AND gre <= 170
            UNION ALL
            SELECT 'GRE Verbal', COUNT(gre_v), ROUND(AVG(gre_v), 2)
            FROM applicants WHERE gre_v IS NOT NULL AND gre_v <= 170
            UNION ALL
            SELECT 'GRE Analytical Writing', COUNT(gre_aw), ROUND(AVG(gre_aw), 2)
            FROM applicants WHERE gre_aw IS NOT NULL AND gre_aw <= 6
        ";

        let mut stmt = self.conn.prepare(query)?;
        let averages = stmt
            .query_map([], |row| {
                Ok(MetricAverage {
                    metric: row.get(0)?,
                    count_with_data: row.get::<_, i64>(1)? as u64,
                    average: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(averages)
    }

    fn average_gpa(
        &self,
        term: &str,
        category: Option<&str>,
        accepted_only: bool,
    ) -> StorageResult<Option<f64>> {
        let average = self.conn.query_row(
            "SELECT ROUND(AVG(gpa), 2)
             FROM applicants
             WHERE term = ?1
               AND (?2 IS NULL OR us_or_international = ?2)
               AND (?3 = 0 OR status LIKE '%accepted%')
               AND gpa <= 5",
            params![term, category, accepted_only],
            |row| row.get(0),
        )?;
        Ok(average)
    }

    fn acceptance_percentage(&self, term: &str) -> StorageResult<Option<f64>> {
        let percentage = self.conn.query_row(
            "SELECT ROUND(
                COUNT(CASE WHEN status LIKE '%accepted%' THEN 1 END) * 100.0 / COUNT(*),
                2
             )
             FROM applicants
             WHERE term = ?1",
            params![term],
            |row| row.get(0),
        )?;
        Ok(percentage)
    }

    fn count_entries(
        &self,
        university: &str,
        degree: &str,
        status: Option<&str>,
        term: Option<&str>,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM applicants
             WHERE llm_generated_university LIKE '%' || ?1 || '%'
               AND degree LIKE ?2
               AND (?3 IS NULL OR status LIKE '%' || ?3 || '%')
               AND (?4 IS NULL OR term LIKE '%' || ?4 || '%')",
            params![university, degree, status, term],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn acceptance_by_university(
        &self,
        min_applications: u32,
    ) -> StorageResult<Vec<UniversityAcceptance>> {
        let query = "
            WITH acceptance_by_category AS (
                SELECT
                    llm_generated_university AS university,
                    us_or_international AS category,
                    ROUND(
                        COUNT(CASE WHEN status LIKE '%accepted%' THEN 1 END) * 100.0 / COUNT(*),
                        2
                    ) AS acceptance_rate
                FROM applicants
                WHERE llm_generated_university IS NOT NULL
                  AND us_or_international IN ('American', 'International')
                  AND status IS NOT NULL
                GROUP BY llm_generated_university, us_or_international
                HAVING COUNT(*) >= ?1
            )
            SELECT
                university,
                MAX(CASE WHEN category = 'American' THEN acceptance_rate END) AS american_rate,
                MAX(CASE WHEN category = 'International' THEN acceptance_rate END) AS international_rate,
                ROUND(
                    MAX(CASE WHEN category = 'International' THEN acceptance_rate END)
                        - MAX(CASE WHEN category = 'American' THEN acceptance_rate END),
                    2
                ) AS rate_difference
            FROM acceptance_by_category
            GROUP BY university
            HAVING COUNT(DISTINCT category) = 2
            ORDER BY rate_difference DESC, university
        ";

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt
            .query_map(params![min_applications], |row| {
                Ok(UniversityAcceptance {
                    university: row.get(0)?,
                    american_rate: row.get(1)?,
                    international_rate: row.get(2)?,
                    rate_difference: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn gpa_by_degree_and_outcome(&self) -> StorageResult<Vec<DegreeOutcomeGpa>> {
        let query = "
            SELECT
                degree,
                CASE
                    WHEN status LIKE '%accepted%' THEN 'Accepted'
                    WHEN status LIKE '%rejected%' THEN 'Rejected'
                    ELSE 'Other'
                END AS outcome,
                COUNT(*),
                ROUND(AVG(gpa), 2)
            FROM applicants
            WHERE gpa IS NOT NULL
              AND gpa <= 5
              AND status IS NOT NULL
              AND degree IS NOT NULL
            GROUP BY degree, outcome
            ORDER BY degree, outcome
        ";

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DegreeOutcomeGpa {
                    degree: row.get(0)?,
                    outcome: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                    average_gpa: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
