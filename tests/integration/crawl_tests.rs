//! End-to-end mirror crawls against a mock site

use crate::common::{mount_asset, mount_page, read, test_config};
use futures::future::BoxFuture;
use site_mirror::crawler::{CrawlOrchestrator, ResourceKind};
use site_mirror::mirror::{DownloadOptions, DownloadRequest};
use site_mirror::translate::Translator;
use site_mirror::MirrorError;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = r##"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="/css/site.css">
</head>
<body>
  <img src="/img/logo.png" alt="logo">
  <img src="https://evil.example/x.png">
  <a href="#top">Top</a>
  <a href="/about">About</a>
  <a href="https://evil.example/x">Elsewhere</a>
</body>
</html>"##;

const ABOUT: &str = r#"<html><body>
  <img src="/img/logo.png">
  <a href="/">Home</a>
  <a href="/team#people">Team</a>
</body></html>"#;

const TEAM: &str = r#"<html><body><a href="/about">Back</a></body></html>"#;

const LOGO: &[u8] = b"\x89PNG fake image bytes";

#[tokio::test]
async fn test_depth_zero_mirrors_start_page_only() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_page(&server, "/about", ABOUT, 0).await;
    mount_asset(&server, "/css/site.css", b"body { margin: 0 }", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let stats = orchestrator.run().await.unwrap();

    let index = read(root.path(), "index.html");
    assert!(index.contains(r#"href="./css/site.css""#));
    assert!(index.contains(r#"src="./img/logo.png""#));
    assert!(index.contains(r#"src="https://evil.example/x.png""#));
    assert!(index.contains(r#"href="/about""#), "links are left alone at depth 0");

    assert_eq!(read(root.path(), "css/site.css"), "body { margin: 0 }");
    assert!(!root.path().join("about").exists());
    assert!(root.path().join("summary.md").exists());

    assert_eq!(stats.pages_mirrored, 1);
    assert_eq!(stats.resources_downloaded, 2);
    assert_eq!(stats.levels_reached, 0);
}

#[tokio::test]
async fn test_depth_one_follows_same_origin_links() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_page(&server, "/about", ABOUT, 1).await;
    mount_page(&server, "/team", TEAM, 0).await;
    mount_asset(&server, "/css/site.css", b"body {}", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    let stats = orchestrator.run().await.unwrap();

    let index = read(root.path(), "index.html");
    assert!(index.contains(r#"href="./about/index.html""#));
    assert!(index.contains(r#"href="https://evil.example/x""#));
    assert!(index.contains(r##"href="#top""##));

    // Last-level pages only point at pages mirrored already; nothing new is fetched
    let about = read(root.path(), "about/index.html");
    assert!(about.contains(r#"src="../img/logo.png""#));
    assert!(about.contains(r#"href="../index.html""#));
    assert!(about.contains(r#"href="/team#people""#));
    assert!(!root.path().join("team").exists());

    assert_eq!(stats.pages_mirrored, 2);
    assert_eq!(stats.levels_reached, 1);
    assert_eq!(stats.existing_skipped, 1);
    assert_eq!(orchestrator.pages_visited(), 2);
}

#[tokio::test]
async fn test_rewritten_reference_resolves_to_downloaded_file() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_page(&server, "/about", ABOUT, 1).await;
    mount_asset(&server, "/css/site.css", b"body {}", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    orchestrator.run().await.unwrap();

    let about = read(root.path(), "about/index.html");
    let start = about.find(r#"src=""#).unwrap() + 5;
    let end = start + about[start..].find('"').unwrap();
    let reference = &about[start..end];

    let mut resolved = PathBuf::from(root.path()).join("about");
    for part in reference.split('/') {
        match part {
            "." => {}
            ".." => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }

    assert_eq!(resolved, root.path().join("img/logo.png"));
    assert_eq!(std::fs::read(resolved).unwrap(), LOGO);
}

#[tokio::test]
async fn test_circular_links_fetch_each_page_once() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_page(&server, "/about", ABOUT, 1).await;
    mount_page(&server, "/team", TEAM, 1).await;
    mount_asset(&server, "/css/site.css", b"body {}", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 2)).unwrap();
    let stats = orchestrator.run().await.unwrap();

    let about = read(root.path(), "about/index.html");
    assert!(about.contains(r#"href="../index.html""#));
    assert!(about.contains(r#"href="../team/index.html#people""#));

    let team = read(root.path(), "team/index.html");
    assert!(team.contains(r#"href="../about/index.html""#));

    assert_eq!(stats.pages_mirrored, 3);
    assert_eq!(stats.levels_reached, 2);
}

#[tokio::test]
async fn test_query_string_resources_downloaded_once() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let page = r#"<html><head>
<script src="/js/app.js?v=42"></script>
<script src="/js/vendor.js?v=42"></script>
</head><body></body></html>"#;
    mount_page(&server, "/", page, 1).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/js/.+\.js$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let stats = orchestrator.run().await.unwrap();

    let files: Vec<String> = std::fs::read_dir(root.path().join("js"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);

    let index = read(root.path(), "index.html");
    assert!(!index.contains("?v=42"));
    assert_eq!(index.matches(&format!("./js/{}", files[0])).count(), 2);

    assert_eq!(stats.resources_downloaded, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn test_entity_encoded_references_are_rewritten() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let page = r#"<html><head>
<script src="/js/app.js?ver=1&#038;x=2"></script>
</head><body><img src="&#x2F;img/logo.png"></body></html>"#;
    mount_page(&server, "/", page, 1).await;
    mount_asset(&server, "/js/app.js", b"console.log(1)", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    orchestrator.run().await.unwrap();

    let index = read(root.path(), "index.html");
    assert!(!index.contains("ver=1"), "script reference left pointing at the site");
    assert!(index.contains(r#"src="./js/app"#));
    assert!(index.contains(r#"src="./img/logo.png""#));
}

#[tokio::test]
async fn test_existing_files_are_not_refetched() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    std::fs::create_dir_all(root.path().join("img")).unwrap();
    std::fs::write(root.path().join("img/logo.png"), b"old").unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_asset(&server, "/css/site.css", b"body {}", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 0).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let stats = orchestrator.run().await.unwrap();

    assert_eq!(std::fs::read(root.path().join("img/logo.png")).unwrap(), b"old");
    assert!(read(root.path(), "index.html").contains(r#"src="./img/logo.png""#));
    assert_eq!(stats.existing_skipped, 1);
    assert_eq!(stats.resources_downloaded, 1);
}

#[tokio::test]
async fn test_overwrite_refetches_existing_files() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    std::fs::create_dir_all(root.path().join("img")).unwrap();
    std::fs::write(root.path().join("img/logo.png"), b"old").unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_asset(&server, "/css/site.css", b"body {}", 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let mut config = test_config(&server, root.path(), 0);
    config.mirror.overwrite = true;
    CrawlOrchestrator::new(config).unwrap().run().await.unwrap();

    assert_eq!(std::fs::read(root.path().join("img/logo.png")).unwrap(), LOGO);
}

#[tokio::test]
async fn test_missing_resource_is_skipped() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let page = r#"<html><body><img src="/img/missing.png"><img src="/img/logo.png"></body></html>"#;
    mount_page(&server, "/", page, 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    Mock::given(method("GET"))
        .and(path("/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let stats = orchestrator.run().await.unwrap();

    let index = read(root.path(), "index.html");
    assert!(index.contains(r#"src="/img/missing.png""#));
    assert!(index.contains(r#"src="./img/logo.png""#));
    assert_eq!(stats.stale_requests, 1);
    assert_eq!(stats.pages_mirrored, 1);
}

#[tokio::test]
async fn test_unreachable_start_page_fails_the_crawl() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    let result = orchestrator.run().await;

    assert!(matches!(result, Err(MirrorError::StaleRequest { .. })));
    assert!(!root.path().join("index.html").exists());
}

#[tokio::test]
async fn test_storage_path_places_entry_page() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<img src="/img/logo.png">"#, 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    let mut config = test_config(&server, root.path(), 0);
    config.mirror.storage_path = "site".to_string();
    config.mirror.markup_filename = "home.html".to_string();
    CrawlOrchestrator::new(config).unwrap().run().await.unwrap();

    let home = read(root.path(), "site/home.html");
    assert!(home.contains(r#"src="../img/logo.png""#));
}

#[tokio::test]
async fn test_translation_runs_on_rewritten_markup() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<p>Hello</p><img src="/img/logo.png">"#, 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 1).await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(wiremock::matchers::body_string_contains("./img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translatedText": "<p>Bonjour</p><img src=\"./img/logo.png\">"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, root.path(), 0);
    config.translation = Some(site_mirror::config::TranslationConfig {
        target_language: "fr".to_string(),
        engine: "libretranslate".to_string(),
        endpoint: format!("{}/translate", server.uri()),
        api_key: None,
    });
    CrawlOrchestrator::new(config).unwrap().run().await.unwrap();

    assert_eq!(
        read(root.path(), "index.html"),
        "<p>Bonjour</p><img src=\"./img/logo.png\">"
    );
}

#[tokio::test]
async fn test_failed_translation_keeps_original_markup() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", "<p>Hello</p>", 1).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "engine unavailable"
        })))
        .mount(&server)
        .await;

    let mut config = test_config(&server, root.path(), 0);
    config.translation = Some(site_mirror::config::TranslationConfig {
        target_language: "de".to_string(),
        engine: "libretranslate".to_string(),
        endpoint: format!("{}/translate", server.uri()),
        api_key: Some("secret".to_string()),
    });
    let stats = CrawlOrchestrator::new(config).unwrap().run().await.unwrap();

    assert_eq!(read(root.path(), "index.html"), "<p>Hello</p>");
    assert_eq!(stats.pages_mirrored, 1);
}

/// Shouts every page instead of calling a translation service
struct UppercaseTranslator;

impl Translator for UppercaseTranslator {
    fn translate_markup<'a>(&'a self, markup: &'a str, _target: &'a str) -> BoxFuture<'a, site_mirror::Result<String>> {
        Box::pin(async move { Ok(markup.to_uppercase()) })
    }

    fn engine_name(&self) -> &str {
        "uppercase"
    }

    fn supports(&self, _language: &str) -> bool {
        true
    }
}

#[tokio::test]
async fn test_custom_translator_replaces_configured_engine() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", "<p>Hello</p>", 1).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, root.path(), 0);
    config.translation = Some(site_mirror::config::TranslationConfig {
        target_language: "es".to_string(),
        engine: "libretranslate".to_string(),
        endpoint: format!("{}/translate", server.uri()),
        api_key: None,
    });
    CrawlOrchestrator::new(config)
        .unwrap()
        .with_translator(Arc::new(UppercaseTranslator))
        .run()
        .await
        .unwrap();

    assert_eq!(read(root.path(), "index.html"), "<P>HELLO</P>");
}

#[tokio::test]
async fn test_find_urls_lists_images_without_writing() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/", HOME, 1).await;
    mount_page(&server, "/about", ABOUT, 1).await;
    mount_asset(&server, "/img/logo.png", LOGO, 0).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    let urls = orchestrator.find_urls(ResourceKind::Images).await.unwrap();

    let urls: Vec<String> = urls.into_iter().map(String::from).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/img/logo.png", server.uri()),
            "https://evil.example/x.png".to_string(),
        ]
    );
    assert!(!root.path().join("index.html").exists());
}

#[tokio::test]
async fn test_download_urls_batch() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_asset(&server, "/a/one.png", b"one", 1).await;
    mount_asset(&server, "/styles/main.css", b"main", 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let base = Url::parse(&server.uri()).unwrap();

    let requests = vec![
        DownloadRequest::new(base.join("/a/one.png").unwrap()),
        DownloadRequest {
            url: base.join("/styles/main.css").unwrap(),
            save_as: Some("renamed.css".to_string()),
            save_to: Some(PathBuf::from("assets")),
        },
        DownloadRequest::new(base.join("/api/data").unwrap()),
    ];

    let results = orchestrator
        .writer()
        .download_urls(requests, &DownloadOptions::default())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().path, PathBuf::from("a/one.png"));
    assert_eq!(
        results[1].as_ref().unwrap().path,
        PathBuf::from("assets/renamed.css")
    );
    assert!(matches!(results[2], Err(MirrorError::Validation(_))));

    assert_eq!(read(root.path(), "a/one.png"), "one");
    assert_eq!(read(root.path(), "assets/renamed.css"), "main");
}
