//! Fetcher retry policy and login handshake against a mock server

use site_mirror::config::{Credentials, HttpConfig};
use site_mirror::crawler::{build_http_client, Fetcher, RateLimiter};
use site_mirror::{CrawlSession, MirrorError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(root: &TempDir, credentials: Option<Credentials>) -> Fetcher {
    let client = build_http_client(&HttpConfig::default()).unwrap();
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_millis(10), 3));
    let session = Arc::new(CrawlSession::new(0, root.path(), credentials));
    Fetcher::new(client, limiter, session)
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_rate_limited_url_goes_stale_after_max_retries() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&root, None);
    let result = fetcher.fetch(&url(&server, "/busy")).await;

    assert!(matches!(result, Err(MirrorError::StaleRequest { .. })));
    assert_eq!(fetcher.limiter().retries_remaining(), 3);

    // The next URL starts with a full retry budget
    let fetched = fetcher.fetch(&url(&server, "/ok")).await.unwrap();
    assert_eq!(fetched.text(), "fine");
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&root, None);
    let fetched = fetcher.fetch(&url(&server, "/flaky")).await.unwrap();

    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.text(), "recovered");
}

#[tokio::test]
async fn test_not_found_is_stale_without_retrying() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&root, None);
    let result = fetcher.fetch(&url(&server, "/gone")).await;

    assert!(matches!(result, Err(MirrorError::StaleRequest { .. })));
    assert_eq!(fetcher.limiter().retries_remaining(), 3);
}

#[tokio::test]
async fn test_other_client_error_consumes_one_retry() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&root, None);
    let result = fetcher.fetch(&url(&server, "/bad")).await;

    assert!(matches!(result, Err(MirrorError::StaleRequest { .. })));
    assert_eq!(fetcher.limiter().retries_remaining(), 2);
}

fn credentials(server: &MockServer) -> Credentials {
    let mut additional = BTreeMap::new();
    additional.insert("remember".to_string(), "1".to_string());

    Credentials {
        auth_url: format!("{}/login", server.uri()),
        auth_username_field: "username".to_string(),
        auth_password_field: "password".to_string(),
        auth_username: "me".to_string(),
        auth_password: "secret".to_string(),
        additional_auth_fields: additional,
    }
}

#[tokio::test]
async fn test_login_handshake_runs_once_before_fetching() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "csrftoken=tok123; Path=/")
                .set_body_string("<form></form>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("username=me"))
        .and(body_string_contains("password=secret"))
        .and(body_string_contains("remember=1"))
        .and(body_string_contains("csrfmiddlewaretoken=tok123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200).set_body_string("members only"))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher(&root, Some(credentials(&server)));
    fetcher.fetch(&url(&server, "/private")).await.unwrap();
    fetcher.fetch(&url(&server, "/private")).await.unwrap();

    assert!(fetcher.session().is_authenticated());
}

#[tokio::test]
async fn test_failed_login_continues_unauthenticated() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher(&root, Some(credentials(&server)));
    assert_eq!(fetcher.fetch(&url(&server, "/public")).await.unwrap().text(), "hello");
    fetcher.fetch(&url(&server, "/public")).await.unwrap();

    assert!(!fetcher.session().is_authenticated());
}
