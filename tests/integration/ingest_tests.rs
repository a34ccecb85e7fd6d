//! Integration tests for the ingest cycle
//!
//! These tests use wiremock to serve listing pages and run full ingest
//! cycles against a SQLite database in a temporary directory.

use gradcafe_harvest::config::load_config_with_hash;
use gradcafe_harvest::crawler::{IngestPipeline, ListingPage};
use gradcafe_harvest::output::{load_analysis, load_raw_pages};
use gradcafe_harvest::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use gradcafe_harvest::{Dashboard, DashboardReply};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(id: u64, institution: &str, status: &str, origin: &str) -> String {
    format!(
        r#"<tr>
            <td><div class="tw-font-medium tw-text-gray-900 tw-text-sm">{institution}</div></td>
            <td><div class="tw-text-gray-900"><span>Computer Science</span><span class="tw-text-gray-500">Masters</span></div></td>
            <td>March 3, 2025</td>
            <td><div>{status}</div></td>
            <td><a href="/result/{id}">See More</a></td>
        </tr>
        <tr><td colspan="5"><div>Fall 2025</div><div>{origin}</div><div>GPA 3.75</div><div>GRE 325</div></td></tr>"#
    )
}

fn listing(entries: &[String]) -> String {
    format!(
        "<html><body><table><thead><tr><th>School</th></tr></thead><tbody>{}</tbody></table></body></html>",
        entries.concat()
    )
}

/// Writes a config pointing at the mock server into the temp directory
fn write_config(dir: &TempDir, base_url: &str, extra: &str) -> std::path::PathBuf {
    let db = dir.path().join("harvest.db");
    let summary = dir.path().join("analysis.md");
    let raw = dir.path().join("raw_pages.json");
    let content = format!(
        r#"
[crawler]
base-url = "{base_url}"
max-empty-pages = 5

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "{db}"
summary-path = "{summary}"
raw-pages-path = "{raw}"

{extra}
"#,
        db = db.display(),
        summary = summary.display(),
        raw = raw.display(),
    );
    let path = dir.path().join("harvest.toml");
    std::fs::write(&path, content).unwrap();
    path
}

/// Mounts the given pages; every other page is an empty listing
async fn mount_listing(server: &MockServer, pages: &[String]) {
    for (i, html) in pages.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/survey/"))
            .and(query_param("page", (i + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(html.clone()))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/survey/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[])))
        .mount(server)
        .await;
}

fn pipeline_for(config_path: &Path) -> (IngestPipeline, Arc<Mutex<SqliteStorage>>, String) {
    let (config, hash) = load_config_with_hash(config_path).unwrap();
    let storage = Arc::new(Mutex::new(
        open_storage(Path::new(&config.output.database_path)).unwrap(),
    ));
    let term = config.analysis.term.clone();
    let pipeline = IngestPipeline::new(Arc::new(config), hash, storage.clone()).unwrap();
    (pipeline, storage, term)
}

#[tokio::test]
async fn test_full_ingest_into_database() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        &[
            listing(&[
                entry(905, "Johns Hopkins University", "Accepted on 1 Mar", "International"),
                entry(904, "MIT", "Rejected on 28 Feb", "American"),
            ]),
            listing(&[entry(903, "Stanford University", "Accepted on 20 Feb", "American")]),
        ],
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &server.uri(), "");
    let (pipeline, storage, _) = pipeline_for(&config_path);

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.counts.pages_with_new_data, 2);
    assert_eq!(report.counts.records_inserted, 3);

    // Two pages with data, then five empty pages before stopping
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 7);

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_applicants().unwrap(), 3);
    let ids = storage.existing_result_ids("/result/").unwrap();
    assert!(ids.contains(&903) && ids.contains(&904) && ids.contains(&905));

    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let analysis = load_analysis(&*storage, "Fall 2025").unwrap();
    assert_eq!(analysis.term_applications, 3);
    assert_eq!(analysis.term_acceptance_percentage, Some(66.67));

    let raw: Vec<ListingPage> = load_raw_pages(&dir.path().join("raw_pages.json")).unwrap();
    assert_eq!(raw.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_second_run_only_adds_new_results() {
    let dir = TempDir::new().unwrap();

    let server = MockServer::start().await;
    mount_listing(
        &server,
        &[listing(&[
            entry(11, "MIT", "Accepted on 1 Mar", "American"),
            entry(10, "CMU", "Rejected on 2 Mar", "International"),
        ])],
    )
    .await;
    let config_path = write_config(&dir, &server.uri(), "");
    let (pipeline, storage, _) = pipeline_for(&config_path);
    pipeline.run().await.unwrap();
    drop(pipeline);

    // The listing gains one newer entry on top
    server.reset().await;
    mount_listing(
        &server,
        &[listing(&[
            entry(12, "Georgetown University", "Accepted on 5 Mar", "American"),
            entry(11, "MIT", "Accepted on 1 Mar", "American"),
            entry(10, "CMU", "Rejected on 2 Mar", "International"),
        ])],
    )
    .await;

    let report = pipeline_for(&config_path).0.run().await.unwrap();

    assert_eq!(report.counts.records_extracted, 3);
    assert_eq!(report.counts.records_inserted, 3);
    assert_eq!(storage.lock().unwrap().count_applicants().unwrap(), 5);

    // Nothing new at all: no page is retained and nothing is inserted
    let report = pipeline_for(&config_path).0.run().await.unwrap();
    assert_eq!(report.counts.pages_with_new_data, 0);
    assert_eq!(report.counts.records_inserted, 0);
    assert_eq!(storage.lock().unwrap().count_applicants().unwrap(), 5);
}

#[tokio::test]
async fn test_listing_error_marks_run_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/survey/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &server.uri(), "");
    let (pipeline, storage, _) = pipeline_for(&config_path);

    let result = pipeline.run().await;

    assert!(result.is_err());
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_applicants().unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap().contains("503"));
}

#[tokio::test]
async fn test_dashboard_pull_then_aggregates() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        &[listing(&[entry(
            7,
            "Johns Hopkins University",
            "Accepted on 1 Mar",
            "American",
        )])],
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &server.uri(), "");
    let (pipeline, storage, term) = pipeline_for(&config_path);
    let dashboard = Dashboard::new(Arc::new(pipeline), storage, term);

    let reply = dashboard.pull_data().await;
    assert_eq!(reply.status_code(), 302);

    let page = dashboard.aggregates();
    assert_eq!(page.status_code(), 200);
    let DashboardReply::Page(analysis) = &page else {
        panic!("expected a page");
    };
    assert_eq!(analysis.total_applicants, 1);
    assert!(page.body().contains("How many entries applied for Fall 2025?"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_enrichment_command_fills_standardized_names() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        &[listing(&[entry(21, "JHU", "Accepted on 1 Mar", "American")])],
    )
    .await;

    let dir = TempDir::new().unwrap();
    let enrichment = r#"
[enrichment]
command = ["sh", "-c", "sed 's/\"llm-generated-university\": null/\"llm-generated-university\": \"Johns Hopkins University\"/'"]
"#;
    let config_path = write_config(&dir, &server.uri(), enrichment);
    let (pipeline, storage, term) = pipeline_for(&config_path);

    pipeline.run().await.unwrap();

    let storage = storage.lock().unwrap();
    let analysis = load_analysis(&*storage, &term).unwrap();
    assert_eq!(analysis.jhu_masters_entries, 1);
}
