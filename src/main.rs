//! Gradcafe-Harvest main entry point
//!
//! This is the command-line interface for the admissions-results harvester.

use anyhow::Context;
use clap::Parser;
use gradcafe_harvest::config::{load_config_with_hash, Config};
use gradcafe_harvest::crawler::{HttpFetcher, IngestPipeline};
use gradcafe_harvest::output::{
    generate_markdown_report, load_analysis, load_raw_pages, print_analysis,
};
use gradcafe_harvest::storage::{open_storage, Storage};
use gradcafe_harvest::{Dashboard, DashboardReply, RecordExtractor};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Gradcafe-Harvest: an incremental admissions-results harvester
///
/// Gradcafe-Harvest walks the survey listing until it stops finding new
/// results, standardizes the new records through an external command, stores
/// them in SQLite and answers the dashboard questions over the stored data.
#[derive(Parser, Debug)]
#[command(name = "gradcafe-harvest")]
#[command(version)]
#[command(about = "An incremental admissions-results harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "reset", "extract"])]
    dry_run: bool,

    /// Print the analysis from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "reset", "extract"])]
    stats: bool,

    /// Write the markdown analysis report and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "reset", "extract"])]
    export_summary: bool,

    /// Drop and recreate the applicants table
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary", "extract"])]
    reset: bool,

    /// Extract records from an archive of raw listing pages and print them as JSON
    #[arg(long, value_name = "RAW_JSON", conflicts_with_all = ["dry_run", "stats", "export_summary", "reset"])]
    extract: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else if cli.reset {
        handle_reset(&config)?;
    } else if let Some(raw_pages) = &cli.extract {
        handle_extract(&config, raw_pages)?;
    } else {
        handle_ingest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gradcafe_harvest=info,warn"),
            1 => EnvFilter::new("gradcafe_harvest=debug,info"),
            2 => EnvFilter::new("gradcafe_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be fetched
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Gradcafe-Harvest Dry Run ===\n");

    let fetcher = HttpFetcher::new(&config.crawler, &config.user_agent)?;

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  First listing page: {}", fetcher.listing_url(1));
    println!("  Detail marker: {}", config.crawler.detail_marker);
    println!(
        "  Stop after empty pages: {}",
        config.crawler.max_empty_pages
    );
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);
    if let Some(path) = &config.output.raw_pages_path {
        println!("  Raw pages: {}", path);
    }
    if let Some(path) = &config.output.extracted_path {
        println!("  Extracted records: {}", path);
    }

    println!("\nEnrichment:");
    match &config.enrichment {
        Some(enrichment) => println!("  Command: {}", enrichment.command.join(" ")),
        None => println!("  Command: none (records stored as extracted)"),
    }

    println!("\nAnalysis term: {}", config.analysis.term);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: prints the analysis from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;

    let analysis = load_analysis(&storage, &config.analysis.term)?;
    print_analysis(&analysis);

    Ok(())
}

/// Handles the --export-summary mode: writes the markdown report
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Analysis Report ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;

    tracing::info!("Running analysis queries...");
    let analysis = load_analysis(&storage, &config.analysis.term)?;

    tracing::info!("Generating markdown report...");
    generate_markdown_report(&analysis, Path::new(&config.output.summary_path))
        .with_context(|| format!("writing {}", config.output.summary_path))?;

    println!("✓ Report exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the --reset mode: drops and recreates the applicants table
fn handle_reset(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;

    storage.reset_applicants()?;
    tracing::warn!("Applicants table reset in {}", config.output.database_path);
    println!("✓ Applicants table reset");

    Ok(())
}

/// Handles the --extract mode: re-extracts records from archived listing pages
fn handle_extract(config: &Config, raw_pages: &Path) -> anyhow::Result<()> {
    let pages = load_raw_pages(raw_pages)
        .with_context(|| format!("reading {}", raw_pages.display()))?;

    let extractor = RecordExtractor::new(&config.crawler.base_url, &config.crawler.detail_marker);
    let records = extractor.extract_pages(&pages);
    tracing::info!(
        "Extracted {} records from {} pages",
        records.len(),
        pages.len()
    );

    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}

/// Handles the default mode: one ingest cycle, then a fresh report
async fn handle_ingest(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(Mutex::new(open_storage(Path::new(
        &config.output.database_path,
    ))?));
    let config = Arc::new(config);

    let pipeline = IngestPipeline::new(config.clone(), config_hash, storage.clone())?;
    let dashboard = Dashboard::new(Arc::new(pipeline), storage, config.analysis.term.clone());

    match dashboard.pull_data().await {
        DashboardReply::Failed { message } => {
            tracing::error!("Ingest failed: {}", message);
            return Err(message.into());
        }
        DashboardReply::Busy => return Err("an ingest cycle is already running".into()),
        _ => tracing::info!("Ingest completed successfully"),
    }

    match dashboard.aggregates() {
        DashboardReply::Page(analysis) => {
            generate_markdown_report(&analysis, Path::new(&config.output.summary_path))?;
            tracing::info!("Report written to {}", config.output.summary_path);
        }
        DashboardReply::Failed { message } => {
            tracing::warn!("Could not compute analysis: {}", message);
        }
        _ => {}
    }

    Ok(())
}
