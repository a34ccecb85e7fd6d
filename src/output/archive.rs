//! JSON artifacts of an ingest run
//!
//! Raw pages are archived as `[{"page": n, "html": "..."}]` and extracted
//! records as an array of record objects, both pretty-printed.

use crate::crawler::ListingPage;
use crate::extract::ApplicantRecord;
use crate::output::OutputResult;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the retained listing pages of a run
pub fn save_raw_pages(path: &Path, pages: &[ListingPage]) -> OutputResult<()> {
    write_json(path, pages)?;
    tracing::info!("Archived {} raw pages to {}", pages.len(), path.display());
    Ok(())
}

/// Reads a raw-page archive back
pub fn load_raw_pages(path: &Path) -> OutputResult<Vec<ListingPage>> {
    let content = std::fs::read_to_string(path)?;
    let pages = serde_json::from_str(&content)?;
    Ok(pages)
}

/// Writes extracted records before enrichment
pub fn save_records(path: &Path, records: &[ApplicantRecord]) -> OutputResult<()> {
    write_json(path, records)?;
    tracing::info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
