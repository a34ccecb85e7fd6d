//! Enrichment of extracted records with standardized names
//!
//! An external command receives the batch as JSON and answers with one row
//! per record carrying `llm-generated-program` and `llm-generated-university`.
//! Only those two fields are taken from the answer; everything else comes
//! from extraction.

mod command;

pub use command::{parse_enrichment_output, CommandEnricher, INPUT_PLACEHOLDER};

use crate::config::EnrichmentConfig;
use crate::extract::{non_empty, ApplicantRecord};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

const PROGRAM_KEY: &str = "llm-generated-program";
const UNIVERSITY_KEY: &str = "llm-generated-university";

/// Errors that can occur while enriching a batch
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Enrichment command is empty")]
    EmptyCommand,

    #[error("Failed to start enrichment command {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Enrichment command failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Undecodable enrichment output: {0}")]
    Decode(String),

    #[error("Enrichment returned {actual} rows for {expected} records")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A stage that fills the standardized name fields of a batch
///
/// Either every record of the batch is enriched or an error is returned;
/// there is no partial application.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, records: Vec<ApplicantRecord>)
        -> Result<Vec<ApplicantRecord>, EnrichError>;
}

/// Leaves records untouched; used when no command is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEnricher;

#[async_trait]
impl Enricher for PassthroughEnricher {
    async fn enrich(
        &self,
        records: Vec<ApplicantRecord>,
    ) -> Result<Vec<ApplicantRecord>, EnrichError> {
        Ok(records)
    }
}

/// Chooses the enricher for the optional `[enrichment]` section
pub fn build_enricher(
    config: Option<&EnrichmentConfig>,
) -> Result<Box<dyn Enricher>, EnrichError> {
    match config {
        Some(config) => Ok(Box::new(CommandEnricher::from_config(config)?)),
        None => {
            tracing::info!("No enrichment command configured, standardized names stay empty");
            Ok(Box::new(PassthroughEnricher))
        }
    }
}

/// Copies the standardized names of row k onto record k
///
/// # Returns
///
/// * `Ok(records)` - every record updated
/// * `Err(EnrichError::LengthMismatch)` - the answer does not have exactly
///   one row per record
pub fn merge_enrichment(
    mut records: Vec<ApplicantRecord>,
    rows: &[Value],
) -> Result<Vec<ApplicantRecord>, EnrichError> {
    if records.len() != rows.len() {
        return Err(EnrichError::LengthMismatch {
            expected: records.len(),
            actual: rows.len(),
        });
    }

    for (record, row) in records.iter_mut().zip(rows) {
        record.llm_generated_program = text_field(row, PROGRAM_KEY);
        record.llm_generated_university = text_field(row, UNIVERSITY_KEY);
    }

    Ok(records)
}

fn text_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).and_then(non_empty)
}
