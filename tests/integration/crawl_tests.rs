//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full login and pagination cycle end-to-end.

use quote_harvester::config::{load_config, Config, RetryConfig, SiteConfig};
use quote_harvester::crawler::run_crawl_with_cancellation;
use quote_harvester::jobs::harvest;
use quote_harvester::storage::{RecordStore, RunStatus, SqliteStorage};
use quote_harvester::{run_crawl, AbortReason, CrawlState, HarvestError};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r#"<html><body>
    <form action="/login" method="post" accept-charset="utf-8">
        <input type="hidden" name="csrf_token" value="tok-123">
        <input type="text" class="form-control" id="username" name="username">
        <input type="password" class="form-control" id="password" name="password">
        <input type="submit" value="Login" class="btn btn-primary">
    </form></body></html>"#;

const LOGGED_IN: &str = r#"<div class="col-md-4"><p><a href="/logout">Logout</a></p></div>"#;

const LOGGED_OUT: &str = r#"<div class="col-md-4"><p><a href="/login">Login</a></p></div>"#;

/// Renders one quote block in the site's markup
fn quote(text: &str, author: &str, slug: &str, tags: &[&str]) -> String {
    let tags: String = tags
        .iter()
        .map(|tag| format!(r#"<a class="tag" href="/tag/{0}/page/1/">{0}</a>"#, tag))
        .collect();

    format!(
        r#"<div class="quote" itemscope itemtype="http://schema.org/CreativeWork">
            <span class="text" itemprop="text">“{}”</span>
            <span>by <small class="author" itemprop="author">{}</small>
                <a href="/author/{}">(about)</a>
                <a href="https://www.goodreads.com/author/show/{}">(Goodreads page)</a>
            </span>
            <div class="tags">Tags: {}</div>
        </div>"#,
        text, author, slug, slug, tags
    )
}

/// Renders a listing page with an optional next link
fn listing(quotes: &[String], next: Option<&str>) -> String {
    let pager = next
        .map(|href| {
            format!(
                r#"<nav><ul class="pager"><li class="next"><a href="{}">Next <span aria-hidden="true">→</span></a></li></ul></nav>"#,
                href
            )
        })
        .unwrap_or_default();

    format!(
        r#"<html><body><div class="container"><div class="row"><div class="col-md-8">{}{}</div>{}</div></div></body></html>"#,
        quotes.concat(),
        pager,
        LOGGED_IN
    )
}

fn page_one() -> String {
    listing(
        &[
            quote(
                "The world as we have created it is a process of our thinking.",
                "Albert Einstein",
                "Albert-Einstein",
                &["change", "thinking"],
            ),
            quote(
                "It is our choices, Harry, that show what we truly are.",
                "J.K. Rowling",
                "J-K-Rowling",
                &["abilities", "choices"],
            ),
        ],
        Some("/page/2/"),
    )
}

fn page_two() -> String {
    listing(
        &[quote(
            "There are only two ways to live your life.",
            "Albert Einstein",
            "Albert-Einstein",
            &["inspirational", "life"],
        )],
        Some("/page/3/"),
    )
}

fn page_three() -> String {
    listing(
        &[quote(
            "A day without sunshine is like, you know, night.",
            "Steve Martin",
            "Steve-Martin",
            &["humor"],
        )],
        None,
    )
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer) -> Config {
    Config {
        site: SiteConfig {
            base_url: server.uri(),
            ..SiteConfig::default()
        },
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..Config::default()
    }
}

async fn mount_login(server: &MockServer, response: &str) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("csrf_token=tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(response.to_string()))
        .mount(server)
        .await;
}

async fn mount_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGGED_IN))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_full_site(server: &MockServer) {
    mount_login(server, LOGGED_IN).await;
    mount_probe(server).await;
    mount_page(server, "/page/1/", page_one()).await;
    mount_page(server, "/page/2/", page_two()).await;
    mount_page(server, "/page/3/", page_three()).await;
}

#[tokio::test]
async fn test_full_crawl_concatenates_pages_in_order() {
    let server = MockServer::start().await;
    mount_full_site(&server).await;

    let report = run_crawl(&create_test_config(&server), "admin", "admin")
        .await
        .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert!(report.is_complete());
    assert_eq!(report.pages_visited, 3);

    let authors: Vec<_> = report.records.iter().map(|r| r.author.as_str()).collect();
    assert_eq!(
        authors,
        vec!["Albert Einstein", "J.K. Rowling", "Albert Einstein", "Steve Martin"]
    );

    let first = &report.records[0];
    assert_eq!(
        first.text,
        "The world as we have created it is a process of our thinking."
    );
    assert_eq!(
        first.author_url,
        format!("{}/author/Albert-Einstein", server.uri())
    );
    assert_eq!(
        first.external_reference_url.as_deref(),
        Some("https://www.goodreads.com/author/show/Albert-Einstein")
    );
    assert_eq!(first.tag_names(), vec!["change", "thinking"]);
    assert_eq!(
        first.tags[0].url,
        format!("{}/tag/change/page/1/", server.uri())
    );
}

#[tokio::test]
async fn test_fetch_failure_keeps_records_gathered_so_far() {
    let server = MockServer::start().await;
    mount_login(&server, LOGGED_IN).await;
    mount_probe(&server).await;
    mount_page(&server, "/page/1/", page_one()).await;

    // One attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/page/2/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page/3/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_three()))
        .expect(0)
        .mount(&server)
        .await;

    let report = run_crawl(&create_test_config(&server), "admin", "admin")
        .await
        .unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert!(!report.is_complete());
    assert_eq!(report.records.len(), 2);

    match report.abort_reason {
        Some(AbortReason::FetchFailed { url, reason }) => {
            assert_eq!(url, format!("{}/page/2/", server.uri()));
            assert!(reason.contains("HTTP 500"), "unexpected reason: {}", reason);
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_login_fetches_no_pages() {
    let server = MockServer::start().await;
    mount_login(&server, LOGGED_OUT).await;

    Mock::given(method("GET"))
        .and(path("/page/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_one()))
        .expect(0)
        .mount(&server)
        .await;

    let result = run_crawl(&create_test_config(&server), "admin", "wrong").await;
    assert!(matches!(result, Err(HarvestError::LoginRejected)));
}

#[tokio::test]
async fn test_changed_login_form_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .expect(1)
        .mount(&server)
        .await;

    let result = run_crawl(&create_test_config(&server), "admin", "admin").await;
    assert!(matches!(
        result,
        Err(HarvestError::AuthenticationStructure(_))
    ));
}

#[tokio::test]
async fn test_unreachable_login_page_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = run_crawl(&create_test_config(&server), "admin", "admin").await;
    match result {
        Err(HarvestError::LoginFailed(msg)) => assert!(msg.contains("3 attempt(s)")),
        other => panic!("expected LoginFailed, got {:?}", other.map(|r| r.state)),
    }
}

#[tokio::test]
async fn test_expired_session_stops_the_crawl() {
    let server = MockServer::start().await;
    mount_login(&server, LOGGED_IN).await;
    mount_page(&server, "/page/1/", page_one()).await;

    // The first probe passes, later ones look logged out
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGGED_IN))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGGED_OUT))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_two()))
        .expect(0)
        .mount(&server)
        .await;

    let report = run_crawl(&create_test_config(&server), "admin", "admin")
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    match report.abort_reason {
        Some(AbortReason::FetchFailed { reason, .. }) => {
            assert!(reason.contains("not authenticated"))
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_page_limit_from_config_file() {
    let server = MockServer::start().await;
    mount_full_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("harvest.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[site]
base-url = "{}"

[retry]
max-retries = 0
base-delay-ms = 1
max-delay-ms = 1

[crawl]
max-pages = 2
"#,
            server.uri()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let report = run_crawl(&config, "admin", "admin").await.unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.abort_reason, Some(AbortReason::PageLimitReached(2)));
}

#[tokio::test]
async fn test_cancelled_crawl_returns_empty_report() {
    let server = MockServer::start().await;
    mount_full_site(&server).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_crawl_with_cancellation(&create_test_config(&server), "admin", "admin", cancel)
        .await
        .unwrap();

    assert_eq!(report.abort_reason, Some(AbortReason::Cancelled));
    assert!(report.records.is_empty());
}

#[tokio::test]
async fn test_repeated_harvests_do_not_duplicate_quotes() {
    let server = MockServer::start().await;
    mount_full_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("quotes.db");
    let config = create_test_config(&server);

    for _ in 0..2 {
        let store = tokio::sync::Mutex::new(SqliteStorage::new(&db_path).unwrap());
        let summary = harvest(
            &config,
            "hash",
            "admin",
            "admin",
            Some(&store),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.saved, 4);
        assert_eq!(summary.skipped, 0);
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_runs().unwrap(), 2);
    assert_eq!(storage.count_records().unwrap(), 4);
    assert_eq!(storage.count_tags().unwrap(), 7);

    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.status, RunStatus::Completed);
    assert_eq!(latest.record_count, 4);
    assert_eq!(storage.list_records_for_run(latest.id).unwrap().len(), 4);
}
