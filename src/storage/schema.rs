//! Database schema definitions
//!
//! The applicants table is kept in its own constant so it can be dropped
//! and recreated without touching the run history.

/// Ingest run history
pub const RUNS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_with_new_data INTEGER NOT NULL DEFAULT 0,
    records_extracted INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);
"#;

/// Applicant rows, one per ingested listing entry
pub const APPLICANTS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS applicants (
    p_id INTEGER PRIMARY KEY AUTOINCREMENT,
    program TEXT,
    university TEXT,
    comments TEXT,
    date_added TEXT,
    url TEXT,
    status TEXT,
    term TEXT,
    us_or_international TEXT,
    gpa REAL,
    gre REAL,
    gre_v REAL,
    gre_aw REAL,
    degree TEXT,
    llm_generated_program TEXT,
    llm_generated_university TEXT
);

CREATE INDEX IF NOT EXISTS idx_applicants_url ON applicants(url);
CREATE INDEX IF NOT EXISTS idx_applicants_term ON applicants(term);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(RUNS_TABLE_SQL)?;
    conn.execute_batch(APPLICANTS_TABLE_SQL)?;
    Ok(())
}

/// Drops the applicants table and creates it empty
pub fn recreate_applicants(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("DROP TABLE IF EXISTS applicants;")?;
    conn.execute_batch(APPLICANTS_TABLE_SQL)?;
    Ok(())
}
