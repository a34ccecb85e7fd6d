//! Crawler module for listing traversal and ingest orchestration
//!
//! This module contains the harvesting logic, including:
//! - HTTP fetching of listing and detail pages
//! - The incremental crawl controller and its stopping rule
//! - The ingest coordinator that runs one full cycle

mod controller;
mod coordinator;
mod fetcher;

pub use controller::{load_existing_ids, CrawlController, ListingPage, PageScan};
pub use coordinator::{IngestCycle, IngestPipeline, IngestReport};
pub use fetcher::{build_http_client, fetch_text, HttpFetcher, PageSource};
