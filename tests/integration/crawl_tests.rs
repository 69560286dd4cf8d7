//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end: configuration, fetching, filtering,
//! indexing, searching and reporting.

use sitesearch::config::{parse_config, Config};
use sitesearch::crawler::{run_crawl, CRAWLER_USER_AGENT};
use sitesearch::output::{CrawlReport, MarkdownFileNotifier, Notifier};
use sitesearch::storage::{IndexStore, RunStatus, SqliteStorage};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration crawling `base_url` into a database inside `dir`
fn create_test_config(base_url: &str, dir: &TempDir, extra_crawler: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
base-url = "{base}/"
request-timeout = 5
max-concurrent-fetches = 2
{extra}

[statistics]
recipients = ["webmaster@example.com"]

[output]
database-path = "{db}"
report-path = "{report}"
"#,
        base = base_url,
        extra = extra_crawler,
        db = dir.path().join("index.db").display(),
        report = dir.path().join("report.md").display(),
    );

    parse_config(&toml).expect("Failed to parse test config")
}

/// An HTML response with the given body
fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

fn open_index(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open index")
}

#[tokio::test]
async fn test_crawl_respects_containment_and_filters() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{base}/a">A</a>
            <a href="/b?date=2020">Archive</a>
            <a href="http://other.com/x">Elsewhere</a>
            </body></html>"#,
            base = base_url
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("<html><head><title>A</title></head><body>Page A</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The filtered page must never be requested
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("<html><body>filtered</body></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, r##"filter-regex = ['#date\=#i']"##);
    let stats = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.outcome, RunStatus::Completed);
    assert_eq!(stats.pages_indexed, 2);
    assert_eq!(stats.pages_filtered, 2);
    assert_eq!(stats.errors, 0);

    let storage = open_index(&config);
    assert_eq!(storage.count().unwrap(), 2);
    assert!(storage.get(&format!("{}/", base_url)).unwrap().is_some());
    assert!(storage.get(&format!("{}/a", base_url)).unwrap().is_some());
    assert!(storage.get(&format!("{}/b?date=2020", base_url)).unwrap().is_none());
}

#[tokio::test]
async fn test_server_error_is_counted_and_crawl_continues() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/broken">Broken</a><a href="/ok">Ok</a></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html("<html><head><title>Ok</title></head><body>fine</body></html>"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, "");
    let stats = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.outcome, RunStatus::Completed);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.pages_indexed, 2);
    assert_eq!(stats.failures.len(), 1);
    assert!(stats.failures[0].url.ends_with("/broken"));

    let storage = open_index(&config);
    assert!(storage.get(&format!("{}/broken", base_url)).unwrap().is_none());
    assert!(storage.get(&format!("{}/ok", base_url)).unwrap().is_some());
}

#[tokio::test]
async fn test_crawled_pages_are_searchable() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome to the site.</p><a href="/zoo">Zoo</a>
            </body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zoo"))
        .respond_with(html(
            r#"<html><head><title>Unicorn enclosure</title></head><body>
            <p>The unicorn lives here, next to another unicorn.</p>
            <script>var unicorn = "hidden";</script>
            </body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, "");
    run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Crawl failed");

    let storage = open_index(&config);
    let results = storage.search("unicorn", 1).unwrap();
    assert_eq!(results.total_matches, 1);
    assert_eq!(results.hits[0].title, "Unicorn enclosure");
    assert!(results.hits[0].url.ends_with("/zoo"));
    assert!(results.hits[0].excerpt.to_lowercase().contains("unicorn"));

    let document = storage.get(&format!("{}/zoo", base_url)).unwrap().unwrap();
    assert!(!document.body.contains("hidden"));

    assert!(storage.search("giraffe", 1).unwrap().is_empty());
}

#[tokio::test]
async fn test_sitemap_indexer_reaches_unlinked_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><head><title>Home</title></head><body>no links</body></html>"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/orphan</loc></url>
</urlset>"#,
                base = base_url
            ),
            "application/xml",
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orphan"))
        .respond_with(html("<html><head><title>Orphan</title></head><body>alone</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, r#"indexer = ["sitemap"]"#);
    let stats = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.pages_indexed, 2);

    let storage = open_index(&config);
    let orphan = storage.get(&format!("{}/orphan", base_url)).unwrap().unwrap();
    assert_eq!(orphan.title, "Orphan");
}

#[tokio::test]
async fn test_requests_carry_crawler_user_agent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", CRAWLER_USER_AGENT))
        .respond_with(html("<html><body>hello</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, "");
    let stats = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.pages_indexed, 1);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_second_run_prunes_unreachable_documents() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/old">Old</a></body></html>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(html("<html><head><title>Old</title></head><body>stale</body></html>"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, "");
    let first = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("First crawl failed");
    assert_eq!(first.pages_indexed, 2);

    // The site drops its link to /old
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>nothing else</body></html>"))
        .mount(&mock_server)
        .await;

    let second = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Second crawl failed");
    assert_eq!(second.documents_removed, 1);

    let storage = open_index(&config);
    assert_eq!(storage.count().unwrap(), 1);
    assert!(storage.get(&format!("{}/old", base_url)).unwrap().is_none());

    let run = storage.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.documents_removed, 1);
    assert_eq!(run.config_hash, "test-hash");
}

#[tokio::test]
async fn test_cancelled_crawl_keeps_existing_documents() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(html("<html><body>page</body></html>"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, "");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = run_crawl(&config, "test-hash", cancel)
        .await
        .expect("Cancelled crawl should still return stats");

    assert_eq!(stats.outcome, RunStatus::Cancelled);
    assert_eq!(stats.documents_removed, 0);
}

#[tokio::test]
async fn test_report_written_after_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/missing">Missing</a></body></html>"#))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &dir, "");
    let stats = run_crawl(&config, "test-hash", CancellationToken::new())
        .await
        .expect("Crawl failed");

    let report = CrawlReport::new(config.crawler.base_url.clone(), stats)
        .with_recipients(config.statistics.recipients.clone())
        .with_config_hash("test-hash");
    MarkdownFileNotifier::new(&config.output.report_path)
        .notify(&report)
        .expect("Failed to write report");

    let content = std::fs::read_to_string(&config.output.report_path).unwrap();
    assert!(content.contains("# Sitesearch Crawl Report"));
    assert!(content.contains("webmaster@example.com"));
    assert!(content.contains("/missing"));
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let toml = r##"
[crawler]
base-url = "http://example.com/"
filter-regex = ["#unterminated"]

[output]
database-path = "index.db"
report-path = "report.md"
"##;

    assert!(parse_config(toml).is_err());
}
