//! State module for tracking whether an ingest cycle is running
//!
//! # Components
//!
//! - `GatePhase`: Idle or Running
//! - `CrawlGate`: the shared compare-and-swap token guarding ingest cycles
//! - `CrawlPermit`: proof of holding the gate, released on drop

mod crawl_gate;

// Re-export main types
pub use crawl_gate::{CrawlGate, CrawlPermit, GatePhase};
