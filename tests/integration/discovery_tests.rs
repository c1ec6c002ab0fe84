//! Read-only searches across the pages of a mock site

use crate::common::{mount_page, test_config};
use site_mirror::crawler::{CrawlOrchestrator, Search};
use site_mirror::document::TagFilter;
use site_mirror::output::export_csv;
use site_mirror::MirrorError;
use tempfile::TempDir;
use wiremock::MockServer;

const CONTACT_HOME: &str = r#"<html><body>
<!-- generated by the CMS -->
<p>Sales: sales@site.example</p>
<div class="card featured" id="hq">Head office <b>+44 2071234567</b></div>
<a href="/support">Support</a>
<a href="mailto:press@site.example">Press</a>
<a href="https://evil.example/contact">Elsewhere</a>
</body></html>"#;

const SUPPORT: &str = r#"<html><body>
<!-- generated by the CMS -->
<!-- support rota: weekdays only -->
<p>Write to help@site.example or sales@site.example</p>
<div class="card">Hotline <a href="tel:5551234567">5551234567</a></div>
<a href="/">Home</a>
</body></html>"#;

async fn contact_site(server: &MockServer, home_hits: u64, support_hits: u64) {
    mount_page(server, "/", CONTACT_HOME, home_hits).await;
    mount_page(server, "/support", SUPPORT, support_hits).await;
}

#[tokio::test]
async fn test_find_emails_across_levels() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    contact_site(&server, 1, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    let emails = orchestrator.find_emails().await.unwrap();

    assert_eq!(
        emails,
        vec![
            "sales@site.example",
            "press@site.example",
            "help@site.example",
        ]
    );
    assert!(!root.path().join("index.html").exists());
}

#[tokio::test]
async fn test_find_phone_numbers_on_start_page_only() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    contact_site(&server, 1, 0).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let numbers = orchestrator.find_phone_numbers().await.unwrap();

    assert_eq!(numbers, vec!["+442071234567"]);
}

#[tokio::test]
async fn test_find_pattern_and_invalid_pattern() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    contact_site(&server, 1, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    let offices = orchestrator.find_pattern(r"(Head office|Hotline)").await.unwrap();
    assert_eq!(offices, vec!["Head office", "Hotline"]);

    let result = orchestrator.find_pattern("(unclosed").await;
    assert!(matches!(result, Err(MirrorError::Validation(_))));
}

#[tokio::test]
async fn test_find_comments_deduplicates() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    contact_site(&server, 1, 1).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();
    let comments = orchestrator.find_comments().await.unwrap();

    assert_eq!(
        comments,
        vec!["generated by the CMS", "support rota: weekdays only"]
    );
}

#[tokio::test]
async fn test_find_tags_by_id_and_class() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    contact_site(&server, 2, 2).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 1)).unwrap();

    let by_id = orchestrator.find_tags_by_id("hq").await.unwrap();
    assert_eq!(by_id.len(), 1);
    assert!(by_id[0].starts_with("<div"));
    assert!(by_id[0].contains("Head office"));

    let cards = orchestrator.find_tags_by_class("card").await.unwrap();
    assert_eq!(cards.len(), 2);
    assert!(cards[1].contains("Hotline"));
}

#[tokio::test]
async fn test_search_results_export_to_csv() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    contact_site(&server, 1, 0).await;

    let orchestrator = CrawlOrchestrator::new(test_config(&server, root.path(), 0)).unwrap();
    let search = Search::Tags(TagFilter::new("b"));
    let tags = orchestrator.find(&search).await.unwrap();
    assert_eq!(tags, vec!["<b>+44 2071234567</b>"]);

    let path = root.path().join("exports/tags.csv");
    export_csv(&path, &search.heading(), &tags).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines, vec!["S/N,tags", "1,<b>+44 2071234567</b>"]);
}
