use site_mirror::config::{Config, PauseDuration};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A configuration mirroring `server` into `root` with test-friendly limits
pub fn test_config(server: &MockServer, root: &Path, max_depth: u32) -> Config {
    let mut config = Config::for_url(format!("{}/", server.uri()));
    config.mirror.max_depth = max_depth;
    config.mirror.storage_root = root.to_path_buf();
    config.limiter.request_budget = 100;
    // Far below what validation accepts, so retries back off quickly
    config.limiter.pause_duration = PauseDuration::Fixed(Duration::from_millis(10));
    config.limiter.max_retries = 3;
    config
}

/// Serves `body` as HTML at `route`, expecting exactly `times` requests
pub async fn mount_page(server: &MockServer, route: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Serves raw bytes at `route`, expecting exactly `times` requests
pub async fn mount_asset(server: &MockServer, route: &str, body: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}

pub fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", relative, e))
}
