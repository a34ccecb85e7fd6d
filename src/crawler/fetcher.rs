//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester:
//! - Building the HTTP client with a descriptive user agent string
//! - GET requests against the listing and detail endpoints
//! - Mapping transport failures and error statuses onto [`HarvestError`]
//!
//! There are no retries and no rate limiting: one call performs one GET.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use gradcafe_harvest::config::UserAgentConfig;
/// use gradcafe_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "GradcafeHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> std::result::Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs one GET and returns the decoded body text
///
/// Connection failures surface as [`HarvestError::Http`]. A
/// non-success status surfaces as [`HarvestError::HttpStatus`], so the body
/// of an error page never reaches the extractor.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|source| HarvestError::Http {
        url: url.to_string(),
        source,
    })
}

/// A source of listing and detail markup
///
/// [`HttpFetcher`] is the production implementation; tests supply synthetic
/// sources so the crawl controller can be driven without a network.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches the listing page with the given 1-based ordinal
    async fn fetch_listing(&self, page: u32) -> Result<String>;

    /// Fetches the detail page of a single result
    ///
    /// The ingest cycle reads everything it stores from listing pages; this
    /// completes the fetcher contract for callers that need one result.
    async fn fetch_detail(&self, id: u64) -> Result<String>;
}

/// Fetches pages from the survey site over HTTP
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    listing_path: String,
    detail_marker: String,
}

impl HttpFetcher {
    /// Creates a fetcher with a fresh client built from the user agent config
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self> {
        let client = build_http_client(user_agent)?;
        Ok(Self::with_client(client, crawler))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, crawler: &CrawlerConfig) -> Self {
        Self {
            client,
            base_url: crawler.base_url.trim_end_matches('/').to_string(),
            listing_path: crawler.listing_path.clone(),
            detail_marker: crawler.detail_marker.clone(),
        }
    }

    /// Builds the locator of a listing page, e.g. `.../survey/?page=3`
    pub fn listing_url(&self, page: u32) -> String {
        format!("{}{}?page={}", self.base_url, self.listing_path, page)
    }

    /// Builds the locator of a result detail page, e.g. `.../result/42`
    ///
    /// Same shape as the `url` the extractor stores for a record.
    pub fn detail_url(&self, id: u64) -> String {
        format!("{}{}{}", self.base_url, self.detail_marker, id)
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch_listing(&self, page: u32) -> Result<String> {
        let url = self.listing_url(page);
        tracing::debug!("Fetching {}", url);
        fetch_text(&self.client, &url).await
    }

    async fn fetch_detail(&self, id: u64) -> Result<String> {
        let url = self.detail_url(id);
        tracing::debug!("Fetching {}", url);
        fetch_text(&self.client, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn crawler_config(base_url: &str) -> CrawlerConfig {
        CrawlerConfig {
            base_url: base_url.to_string(),
            listing_path: "/survey/".to_string(),
            detail_marker: "/result/".to_string(),
            max_empty_pages: 5,
            max_pages: None,
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_locators() {
        let fetcher =
            HttpFetcher::new(&crawler_config("https://www.thegradcafe.com/"), &create_test_config())
                .unwrap();

        assert_eq!(
            fetcher.listing_url(3),
            "https://www.thegradcafe.com/survey/?page=3"
        );
        assert_eq!(
            fetcher.detail_url(98765),
            "https://www.thegradcafe.com/result/98765"
        );
    }

    #[test]
    fn test_detail_url_matches_extracted_url() {
        let config = crawler_config("https://www.thegradcafe.com/");
        let fetcher = HttpFetcher::new(&config, &create_test_config()).unwrap();
        let html = r#"<tr><td></td><td></td><td></td><td></td><td><a href="/result/4242">See More</a></td></tr>"#;

        let records = crate::extract::RecordExtractor::new(&config.base_url, &config.detail_marker)
            .extract(html);
        let id = records[0].result_id(&config.detail_marker).unwrap();

        assert_eq!(id, 4242);
        assert_eq!(records[0].url.as_deref(), Some(fetcher.detail_url(id).as_str()));
    }

    #[tokio::test]
    async fn test_fetch_listing_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/survey/"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>page two</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&crawler_config(&server.uri()), &create_test_config()).unwrap();
        let body = fetcher.fetch_listing(2).await.unwrap();

        assert_eq!(body, "<html>page two</html>");
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&crawler_config(&server.uri()), &create_test_config()).unwrap();
        let err = fetcher.fetch_detail(1).await.unwrap_err();

        assert!(matches!(err, HarvestError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_surfaced() {
        let client = build_http_client(&create_test_config()).unwrap();
        // Port 9 (discard) on localhost is normally closed.
        let result = fetch_text(&client, "http://127.0.0.1:9/survey/?page=1").await;

        assert!(matches!(result, Err(HarvestError::Http { .. })));
    }
}
