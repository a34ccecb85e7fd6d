//! Output module for reports and intermediate artifacts
//!
//! This module handles:
//! - Computing the dashboard analysis from the store
//! - Printing the analysis to the console
//! - Writing the analysis as a markdown report
//! - Archiving raw listing pages and extracted records as JSON

pub mod analysis;
mod archive;
mod markdown;
pub mod stats;

pub use analysis::{format_average, format_percentage, load_analysis, Analysis};
pub use archive::{load_raw_pages, save_raw_pages, save_records};
pub use markdown::{format_markdown_report, generate_markdown_report};
pub use stats::print_analysis;

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
