//! Integration tests for Gradcafe-Harvest

mod ingest_tests;
