//! Ingest coordinator - one complete harvest cycle
//!
//! A cycle runs the stages strictly in sequence:
//! - Loading the result ids already in the store
//! - Walking the listing until it stops yielding new ids
//! - Extracting records from the retained pages
//! - Enriching the batch with standardized names
//! - Inserting each record
//!
//! Each cycle is tracked as an ingest run. The store is locked for one
//! operation at a time and never across an await.

use crate::config::Config;
use crate::crawler::controller::{load_existing_ids, CrawlController};
use crate::crawler::fetcher::{HttpFetcher, PageSource};
use crate::enrich::{build_enricher, Enricher};
use crate::extract::RecordExtractor;
use crate::output::{save_raw_pages, save_records};
use crate::storage::{RunCounts, SqliteStorage, Storage};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of a successful ingest cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub run_id: i64,
    pub counts: RunCounts,
}

/// Anything that can run one ingest cycle
///
/// The dashboard triggers cycles through this trait, so tests can stand in
/// a cycle that blocks or fails on demand.
#[async_trait]
pub trait IngestCycle: Send + Sync {
    async fn run_cycle(&self) -> Result<IngestReport>;
}

/// The production ingest pipeline
pub struct IngestPipeline {
    config: Arc<Config>,
    config_hash: String,
    source: Box<dyn PageSource>,
    extractor: RecordExtractor,
    enricher: Box<dyn Enricher>,
    storage: Arc<Mutex<SqliteStorage>>,
}

impl IngestPipeline {
    /// Creates a pipeline that fetches over HTTP and enriches per config
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `config_hash` - Hash recorded on each run
    /// * `storage` - The shared store
    ///
    /// # Returns
    ///
    /// * `Ok(IngestPipeline)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client or enricher could not be built
    pub fn new(
        config: Arc<Config>,
        config_hash: String,
        storage: Arc<Mutex<SqliteStorage>>,
    ) -> Result<Self> {
        let source = HttpFetcher::new(&config.crawler, &config.user_agent)?;
        let enricher = build_enricher(config.enrichment.as_ref())?;
        Ok(Self::with_parts(
            config,
            config_hash,
            Box::new(source),
            enricher,
            storage,
        ))
    }

    /// Creates a pipeline from explicit stages
    pub fn with_parts(
        config: Arc<Config>,
        config_hash: String,
        source: Box<dyn PageSource>,
        enricher: Box<dyn Enricher>,
        storage: Arc<Mutex<SqliteStorage>>,
    ) -> Self {
        let extractor = RecordExtractor::new(&config.crawler.base_url, &config.crawler.detail_marker);
        Self {
            config,
            config_hash,
            source,
            extractor,
            enricher,
            storage,
        }
    }

    /// Runs one cycle, recording it as an ingest run
    ///
    /// On failure the run is marked failed and the error is returned. Rows
    /// inserted before a failure stay in the store.
    pub async fn run(&self) -> Result<IngestReport> {
        let run_id = self.lock_storage()?.create_run(&self.config_hash)?;
        tracing::info!("Starting ingest run {}", run_id);

        match self.execute().await {
            Ok(counts) => {
                self.lock_storage()?.complete_run(run_id, &counts)?;
                tracing::info!(
                    "Ingest run {} completed: {} pages with new data, {} records extracted, {} inserted",
                    run_id,
                    counts.pages_with_new_data,
                    counts.records_extracted,
                    counts.records_inserted
                );
                Ok(IngestReport { run_id, counts })
            }
            Err(e) => {
                tracing::error!("Ingest run {} failed: {}", run_id, e);
                let message = e.to_string();
                let marked = self
                    .lock_storage()
                    .and_then(|mut storage| {
                        storage
                            .fail_run(run_id, &message)
                            .map_err(HarvestError::from)
                    });
                if let Err(mark_err) = marked {
                    tracing::warn!("Could not mark run {} as failed: {}", run_id, mark_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<RunCounts> {
        let crawler = &self.config.crawler;

        let existing_ids = {
            let storage = self.lock_storage()?;
            load_existing_ids(&*storage, &crawler.detail_marker)
        };

        let mut controller = CrawlController::new(existing_ids, crawler);
        let pages = controller.run(self.source.as_ref()).await?;

        if let Some(path) = &self.config.output.raw_pages_path {
            save_raw_pages(Path::new(path), &pages)?;
        }

        let records = self.extractor.extract_pages(&pages);
        tracing::info!(
            "Extracted {} records from {} pages",
            records.len(),
            pages.len()
        );

        if let Some(path) = &self.config.output.extracted_path {
            save_records(Path::new(path), &records)?;
        }

        let records_extracted = records.len() as u32;
        let records = self.enricher.enrich(records).await?;

        let mut records_inserted = 0;
        for record in &records {
            self.lock_storage()?.insert_applicant(record)?;
            records_inserted += 1;
            tracing::debug!("Inserted {:?}", record.url);
        }

        Ok(RunCounts {
            pages_with_new_data: pages.len() as u32,
            records_extracted,
            records_inserted,
        })
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>> {
        self.storage
            .lock()
            .map_err(|_| HarvestError::Storage("storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl IngestCycle for IngestPipeline {
    async fn run_cycle(&self) -> Result<IngestReport> {
        self.run().await
    }
}
