//! Dashboard service
//!
//! The three operations behind the analysis page: render the aggregates,
//! trigger an ingest cycle, and refresh. A trigger that arrives while a
//! cycle is running is rejected with a busy reply rather than queued.

use crate::crawler::IngestCycle;
use crate::output::{format_markdown_report, load_analysis, Analysis};
use crate::state::CrawlGate;
use crate::storage::SqliteStorage;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Where successful triggers send the client
pub const HOME: &str = "/";

/// Reply of a dashboard operation
#[derive(Debug)]
pub enum DashboardReply {
    /// The analysis page
    Page(Box<Analysis>),
    Redirect { location: String },
    /// A cycle is already running
    Busy,
    Failed { message: String },
}

impl DashboardReply {
    fn home() -> Self {
        Self::Redirect {
            location: HOME.to_string(),
        }
    }

    /// HTTP status equivalent of the reply
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Page(_) => 200,
            Self::Redirect { .. } => 302,
            Self::Busy => 409,
            Self::Failed { .. } => 500,
        }
    }

    /// Reply body: the rendered page, or a JSON object for busy and failed
    pub fn body(&self) -> String {
        match self {
            Self::Page(analysis) => format_markdown_report(analysis),
            Self::Redirect { .. } => String::new(),
            Self::Busy => json!({ "busy": true }).to_string(),
            Self::Failed { message } => json!({ "error": message }).to_string(),
        }
    }
}

/// Dashboard operations over a shared store and ingest cycle
pub struct Dashboard<C: IngestCycle> {
    gate: Arc<CrawlGate>,
    cycle: Arc<C>,
    storage: Arc<Mutex<SqliteStorage>>,
    analysis_term: String,
}

impl<C: IngestCycle> Dashboard<C> {
    pub fn new(
        cycle: Arc<C>,
        storage: Arc<Mutex<SqliteStorage>>,
        analysis_term: impl Into<String>,
    ) -> Self {
        Self {
            gate: Arc::new(CrawlGate::new()),
            cycle,
            storage,
            analysis_term: analysis_term.into(),
        }
    }

    /// The gate guarding ingest cycles
    pub fn gate(&self) -> &Arc<CrawlGate> {
        &self.gate
    }

    /// Computes the analysis page
    pub fn aggregates(&self) -> DashboardReply {
        let storage = match self.storage.lock() {
            Ok(storage) => storage,
            Err(_) => {
                return DashboardReply::Failed {
                    message: "storage lock poisoned".to_string(),
                }
            }
        };

        match load_analysis(&*storage, &self.analysis_term) {
            Ok(analysis) => DashboardReply::Page(Box::new(analysis)),
            Err(e) => {
                tracing::error!("Failed to compute analysis: {}", e);
                DashboardReply::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Runs one ingest cycle unless one is already running
    pub async fn pull_data(&self) -> DashboardReply {
        let Some(_permit) = self.gate.try_acquire() else {
            tracing::info!("Ingest cycle already running, rejecting trigger");
            return DashboardReply::Busy;
        };

        match self.cycle.run_cycle().await {
            Ok(report) => {
                tracing::info!(
                    "Ingest run {} inserted {} records",
                    report.run_id,
                    report.counts.records_inserted
                );
                DashboardReply::home()
            }
            Err(e) => {
                tracing::error!("Ingest cycle failed: {}", e);
                DashboardReply::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Sends the client back to the page unless a cycle is running
    pub fn refresh(&self) -> DashboardReply {
        if self.gate.is_busy() {
            DashboardReply::Busy
        } else {
            DashboardReply::home()
        }
    }
}
