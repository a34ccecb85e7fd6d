//! Row-pairing extraction of applicant records
//!
//! The survey listing renders each applicant across consecutive table rows:
//!
//! 1. a primary row with at least five cells (institution, program and
//!    degree, date added, decision, actions),
//! 2. a detail row whose cells carry term, applicant category, scores and GPA
//!    as small labelled `div`s,
//! 3. optionally a comment row with a single classed paragraph.
//!
//! Rows are walked with a cursor. A row with fewer than five cells is noise
//! and is skipped one at a time; a primary row consumes itself and the row
//! after it. The comment row is only peeked at, never consumed.

use crate::crawler::ListingPage;
use crate::extract::record::{combine_program, non_empty, ApplicantRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Minimum number of cells that marks a primary row
pub const MIN_PRIMARY_CELLS: usize = 5;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static INSTITUTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.tw-font-medium.tw-text-gray-900.tw-text-sm").unwrap()
});
static SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static PROGRAM_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.tw-text-gray-900").unwrap());
static DEGREE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.tw-text-gray-500").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static COMMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.tw-text-gray-500.tw-text-sm.tw-my-0").unwrap());

static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<div[^>]*>\s*((?:Accepted|Rejected)\s+on\s+[A-Za-z0-9 ,]+)\s*</div>").unwrap()
});
static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Spring|Summer|Fall|Winter)\s+\d{4}").unwrap());
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<div[^>]*>\s*(International|American)\s*</div>").unwrap()
});
static GRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div[^>]*>\s*GRE (\d+)\s*</div>").unwrap());
static GRE_V_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div[^>]*>\s*GRE V (\d+)\s*</div>").unwrap());
static GRE_AW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div[^>]*>\s*GRE AW ([\d.]+)\s*</div>").unwrap());
static GPA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div[^>]*>\s*GPA ([\d.]+)\s*</div>").unwrap());

/// Converts listing markup into applicant records
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    base_url: String,
    detail_marker: String,
}

impl RecordExtractor {
    /// Creates an extractor that resolves detail hrefs against `base_url`
    pub fn new(base_url: &str, detail_marker: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            detail_marker: detail_marker.to_string(),
        }
    }

    /// Extracts every record on one page, in row order
    ///
    /// Never fails: a field whose element or pattern is absent is left
    /// missing. The result depends on nothing but `html`.
    pub fn extract(&self, html: &str) -> Vec<ApplicantRecord> {
        let document = parse_rows(html);
        let rows: Vec<ElementRef> = document.select(&ROW).collect();
        let mut records = Vec::new();

        let mut i = 0;
        while i < rows.len() {
            let cells: Vec<ElementRef> = rows[i].select(&CELL).collect();
            if cells.len() < MIN_PRIMARY_CELLS {
                i += 1;
                continue;
            }

            let mut record = self.primary_fields(&cells);

            if let Some(detail_row) = rows.get(i + 1) {
                let detail_cells: Vec<ElementRef> = detail_row.select(&CELL).collect();
                if !detail_cells.is_empty() {
                    apply_detail_fields(&mut record, &detail_cells);
                    record.comments = rows.get(i + 2).and_then(comment_text);
                }
            }

            tracing::trace!("Extracted record {:?}", record.url);
            records.push(record);
            i += 2;
        }

        records
    }

    /// Extracts the records of several pages, preserving page order
    pub fn extract_pages(&self, pages: &[ListingPage]) -> Vec<ApplicantRecord> {
        pages
            .iter()
            .flat_map(|page| {
                let records = self.extract(&page.html);
                tracing::debug!("Page {}: extracted {} records", page.page, records.len());
                records
            })
            .collect()
    }

    fn primary_fields(&self, cells: &[ElementRef]) -> ApplicantRecord {
        let institution = first_text(&cells[0], &INSTITUTION);
        let program_name = first_text(&cells[1], &SPAN);
        let degree = cells[1]
            .select(&PROGRAM_BLOCK)
            .next()
            .and_then(|block| first_text(&block, &DEGREE));
        let date_added = non_empty(&element_text(&cells[2]));
        let status = STATUS_RE
            .captures(&cells[3].html())
            .and_then(|caps| non_empty(&caps[1]));
        let url = cells[4]
            .select(&ANCHOR)
            .filter_map(|anchor| anchor.value().attr("href"))
            .find(|href| href.contains(&self.detail_marker))
            .map(|href| format!("{}{}", self.base_url, href));

        ApplicantRecord {
            program: combine_program(program_name.as_deref(), institution.as_deref()),
            university: institution,
            date_added,
            url,
            status,
            degree,
            ..Default::default()
        }
    }
}

/// Parses listing markup, wrapping bare row fragments in a table
///
/// The HTML5 tree builder drops `tr` and `td` tags found outside a table.
fn parse_rows(html: &str) -> Html {
    if html.to_ascii_lowercase().contains("<table") {
        Html::parse_document(html)
    } else {
        Html::parse_document(&format!("<table>{}</table>", html))
    }
}

/// Applies the term, category, score and GPA patterns to the detail row
fn apply_detail_fields(record: &mut ApplicantRecord, cells: &[ElementRef]) {
    let markup = cells
        .iter()
        .map(|cell| cell.html())
        .collect::<Vec<_>>()
        .join(", ");

    record.term = TERM_RE
        .find(&markup)
        .map(|found| found.as_str().to_string());
    record.us_or_international = capture(&CATEGORY_RE, &markup);
    record.gre = capture(&GRE_RE, &markup);
    record.gre_v = capture(&GRE_V_RE, &markup);
    record.gre_aw = capture(&GRE_AW_RE, &markup);
    record.gpa = capture(&GPA_RE, &markup);
}

fn comment_text(row: &ElementRef) -> Option<String> {
    first_text(row, &COMMENT)
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .map(|caps| caps[1].to_string())
}

fn first_text(scope: &ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .and_then(|element| non_empty(&element_text(&element)))
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}
