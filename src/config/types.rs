use serde::Deserialize;

/// Main configuration structure for Gradcafe-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub enrichment: Option<EnrichmentConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Listing crawl configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Site root, e.g. `https://www.thegradcafe.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the paginated listing; `?page=N` is appended
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    /// Path fragment that precedes the numeric id in detail locators
    #[serde(rename = "detail-marker", default = "default_detail_marker")]
    pub detail_marker: String,

    /// Consecutive pages without new ids before the crawl stops
    #[serde(rename = "max-empty-pages", default = "default_max_empty_pages")]
    pub max_empty_pages: u32,

    /// Hard cap on listing pages visited in one run
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown analysis report
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Where to archive the raw listing pages of each run
    #[serde(rename = "raw-pages-path", default)]
    pub raw_pages_path: Option<String>,

    /// Where to write the extracted (pre-enrichment) records of each run
    #[serde(rename = "extracted-path", default)]
    pub extracted_path: Option<String>,
}

/// External standardization command
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Program followed by its arguments; `{input}` is replaced by the input file
    pub command: Vec<String>,

    /// Working directory of the command
    #[serde(rename = "working-dir", default)]
    pub working_dir: Option<String>,

    /// File the records are written to when the command takes `{input}`
    #[serde(rename = "input-path", default)]
    pub input_path: Option<String>,
}

/// Dashboard analysis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Admission term the term-scoped questions are asked about
    #[serde(default = "default_term")]
    pub term: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            term: default_term(),
        }
    }
}

fn default_listing_path() -> String {
    "/survey/".to_string()
}

fn default_detail_marker() -> String {
    "/result/".to_string()
}

fn default_max_empty_pages() -> u32 {
    5
}

fn default_term() -> String {
    "Fall 2025".to_string()
}
