//! Incremental crawl controller
//!
//! Walks the listing pages in increasing order and keeps only the pages that
//! link to at least one result id not yet in the store. The walk stops after
//! a run of consecutive pages without new ids.
//!
//! The stopping rule assumes newest-first pagination. If the listing is
//! re-sorted, a window of already-known pages can end the walk before older
//! unseen entries are reached.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::PageSource;
use crate::extract::extract_detail_ids;
use crate::storage::Storage;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// One listing page retained by the crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    /// 1-based ordinal of the page in the listing
    pub page: u32,

    /// Raw markup as fetched
    pub html: String,
}

/// Outcome of scanning one listing page for ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScan {
    pub page: u32,
    pub total_ids: usize,
    pub new_ids: BTreeSet<u64>,
    pub has_new: bool,
}

/// Loads the ids already present in the store
///
/// A failing store is not fatal: the failure is logged and the crawl
/// proceeds with an empty set, accepting duplicate rows.
pub fn load_existing_ids(store: &dyn Storage, detail_marker: &str) -> HashSet<u64> {
    match store.existing_result_ids(detail_marker) {
        Ok(ids) => {
            tracing::info!("Loaded {} existing result ids", ids.len());
            ids
        }
        Err(e) => {
            tracing::warn!("Could not load existing result ids, assuming none: {}", e);
            HashSet::new()
        }
    }
}

/// Drives the listing walk and decides when it ends
#[derive(Debug)]
pub struct CrawlController {
    existing_ids: HashSet<u64>,
    detail_marker: String,
    max_empty_pages: u32,
    max_pages: Option<u32>,
    page_number: u32,
    consecutive_empty: u32,
    pages_visited: u32,
}

impl CrawlController {
    /// Creates a controller positioned at page 1
    pub fn new(existing_ids: HashSet<u64>, config: &CrawlerConfig) -> Self {
        Self::with_limits(
            existing_ids,
            &config.detail_marker,
            config.max_empty_pages,
            config.max_pages,
        )
    }

    pub fn with_limits(
        existing_ids: HashSet<u64>,
        detail_marker: &str,
        max_empty_pages: u32,
        max_pages: Option<u32>,
    ) -> Self {
        Self {
            existing_ids,
            detail_marker: detail_marker.to_string(),
            max_empty_pages,
            max_pages,
            page_number: 1,
            consecutive_empty: 0,
            pages_visited: 0,
        }
    }

    /// The ordinal of the next page to visit
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    /// Whether the walk has reached a stopping condition
    pub fn is_finished(&self) -> bool {
        self.consecutive_empty >= self.max_empty_pages
            || self
                .max_pages
                .is_some_and(|cap| self.pages_visited >= cap)
    }

    /// Records the markup of the current page and advances to the next one
    ///
    /// A page with new ids resets the empty-page counter; a page without
    /// them increments it. The existing-id set is not updated.
    pub fn observe_page(&mut self, html: &str) -> PageScan {
        let page = self.page_number;
        let page_ids = extract_detail_ids(html, &self.detail_marker);
        let new_ids: BTreeSet<u64> = page_ids
            .iter()
            .copied()
            .filter(|id| !self.existing_ids.contains(id))
            .collect();
        let has_new = !new_ids.is_empty();

        if has_new {
            self.consecutive_empty = 0;
        } else {
            self.consecutive_empty += 1;
        }
        self.page_number += 1;
        self.pages_visited += 1;

        tracing::info!(
            "Page {}: {} new results out of {} total",
            page,
            new_ids.len(),
            page_ids.len()
        );

        PageScan {
            page,
            total_ids: page_ids.len(),
            new_ids,
            has_new,
        }
    }

    /// Walks the listing until a stopping condition, returning retained pages
    ///
    /// Pages are returned in visit order. A fetch error ends the walk and is
    /// propagated.
    pub async fn run<S: PageSource + ?Sized>(&mut self, source: &S) -> Result<Vec<ListingPage>> {
        let mut retained = Vec::new();

        while !self.is_finished() {
            let page = self.page_number;
            let html = source.fetch_listing(page).await?;
            let scan = self.observe_page(&html);
            if scan.has_new {
                retained.push(ListingPage { page, html });
            }
        }

        if self.consecutive_empty >= self.max_empty_pages {
            tracing::info!(
                "No new results for {} consecutive pages, stopping after page {}",
                self.consecutive_empty,
                self.page_number - 1
            );
        } else {
            tracing::info!("Reached page cap after {} pages", self.pages_visited);
        }

        Ok(retained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use crate::HarvestError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves scripted listing pages and records which ones were requested
    struct ScriptedSource {
        pages: Vec<String>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<String>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_listing(&self, page: u32) -> Result<String> {
            self.requested.lock().unwrap().push(page);
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_else(|| "<html><body></body></html>".to_string()))
        }

        async fn fetch_detail(&self, id: u64) -> Result<String> {
            Ok(format!("<html>{}</html>", id))
        }
    }

    fn listing(ids: &[u64]) -> String {
        let anchors: String = ids
            .iter()
            .map(|id| format!(r#"<tr><td><a href="/result/{}">See More</a></td></tr>"#, id))
            .collect();
        format!("<html><body><table>{}</table></body></html>", anchors)
    }

    fn controller(existing: &[u64]) -> CrawlController {
        CrawlController::with_limits(existing.iter().copied().collect(), "/result/", 5, None)
    }

    #[test]
    fn test_new_ids_reset_counter() {
        let mut ctl = controller(&[1, 2, 3]);
        ctl.observe_page(&listing(&[1]));
        assert_eq!(ctl.consecutive_empty(), 1);

        let scan = ctl.observe_page(&listing(&[3, 4]));

        assert_eq!(scan.page, 2);
        assert_eq!(scan.total_ids, 2);
        assert_eq!(scan.new_ids.into_iter().collect::<Vec<_>>(), vec![4]);
        assert!(scan.has_new);
        assert_eq!(ctl.consecutive_empty(), 0);
        assert_eq!(ctl.page_number(), 3);
    }

    #[test]
    fn test_page_without_links_counts_as_empty() {
        let mut ctl = controller(&[]);
        let scan = ctl.observe_page("<html><body>maintenance</body></html>");

        assert!(!scan.has_new);
        assert_eq!(scan.total_ids, 0);
        assert_eq!(ctl.consecutive_empty(), 1);
    }

    #[tokio::test]
    async fn test_stops_after_five_stale_pages() {
        let stale = listing(&[1, 2]);
        let source = ScriptedSource::new(vec![stale.clone(); 10]);
        let mut ctl = controller(&[1, 2]);

        let pages = ctl.run(&source).await.unwrap();

        assert!(pages.is_empty());
        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_retains_pages_with_new_ids_in_order() {
        let source = ScriptedSource::new(vec![
            listing(&[10, 11]),
            listing(&[1]),
            listing(&[12]),
        ]);
        let mut ctl = controller(&[1]);

        let pages = ctl.run(&source).await.unwrap();

        let ordinals: Vec<u32> = pages.iter().map(|p| p.page).collect();
        assert_eq!(ordinals, vec![1, 3]);
        // Page 3 reset the counter, so five empty pages follow it.
        assert_eq!(source.requested().len(), 8);
    }

    #[tokio::test]
    async fn test_stale_window_ends_crawl_before_unseen_pages() {
        // Pages 1-5 only link known ids; page 6 would have new ones but is
        // never requested.
        let mut pages = vec![listing(&[1]); 5];
        pages.push(listing(&[99]));
        let source = ScriptedSource::new(pages);
        let mut ctl = controller(&[1]);

        let retained = ctl.run(&source).await.unwrap();

        assert!(retained.is_empty());
        assert!(!source.requested().contains(&6));
    }

    #[tokio::test]
    async fn test_page_cap() {
        let source = ScriptedSource::new((1..=10).map(|id| listing(&[id])).collect());
        let mut ctl = CrawlController::with_limits(HashSet::new(), "/result/", 5, Some(3));

        let retained = ctl.run(&source).await.unwrap();

        assert_eq!(retained.len(), 3);
        assert_eq!(source.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        struct Failing;

        #[async_trait]
        impl PageSource for Failing {
            async fn fetch_listing(&self, page: u32) -> Result<String> {
                Err(HarvestError::HttpStatus {
                    url: format!("http://test/survey/?page={}", page),
                    status: 500,
                })
            }

            async fn fetch_detail(&self, _id: u64) -> Result<String> {
                unreachable!()
            }
        }

        let mut ctl = controller(&[]);
        let result = ctl.run(&Failing).await;
        assert!(matches!(result, Err(HarvestError::HttpStatus { status: 500, .. })));
    }

    #[test]
    fn test_load_existing_ids_from_store() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for url in [
            "https://www.thegradcafe.com/result/7",
            "https://www.thegradcafe.com/result/8",
        ] {
            let record = crate::extract::ApplicantRecord {
                url: Some(url.to_string()),
                ..Default::default()
            };
            storage.insert_applicant(&record).unwrap();
        }

        let ids = load_existing_ids(&storage, "/result/");
        assert_eq!(ids, HashSet::from([7, 8]));
    }

    #[test]
    fn test_load_existing_ids_degrades_to_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .connection()
            .execute("DROP TABLE applicants", [])
            .unwrap();

        assert!(load_existing_ids(&storage, "/result/").is_empty());
    }
}
