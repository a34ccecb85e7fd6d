//! Detail-locator id scanning
//!
//! Shared by the crawl controller (which ids does a listing page carry?) and
//! the store (which ids are already ingested?).

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Collects every detail id linked from a listing page
///
/// Anchors whose href contains `marker` contribute the integer that follows
/// the last occurrence of the marker. Hrefs whose tail is not an integer are
/// skipped.
pub fn extract_detail_ids(html: &str, marker: &str) -> BTreeSet<u64> {
    let document = Html::parse_document(html);

    document
        .select(&ANCHOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| detail_id(href, marker))
        .collect()
}

/// Parses the id from a single href or locator
///
/// # Example
///
/// ```
/// use gradcafe_harvest::extract::detail_id;
///
/// assert_eq!(detail_id("/result/12345", "/result/"), Some(12345));
/// assert_eq!(detail_id("/result/12345#top", "/result/"), None);
/// assert_eq!(detail_id("/survey/?page=2", "/result/"), None);
/// ```
pub fn detail_id(href: &str, marker: &str) -> Option<u64> {
    let (_, tail) = href.rsplit_once(marker)?;
    tail.trim().parse().ok()
}

/// Finds the first id that directly follows `marker` in a stored locator
///
/// Unlike [`detail_id`], trailing characters after the digits are ignored,
/// so `https://host/result/42?ref=x` yields 42.
pub fn leading_detail_id(locator: &str, marker: &str) -> Option<u64> {
    let start = locator.find(marker)? + marker.len();
    let digits: String = locator[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
