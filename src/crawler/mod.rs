//! Crawler module for fetching and mirroring pages
//!
//! This module contains the core crawling logic, including:
//! - The request budget and retry policy shared by every worker
//! - HTTP fetching with authentication, retries and backoff
//! - The depth-bounded traversal that mirrors and rewrites pages
//! - Read-only discovery of resource URLs, text patterns, comments and tags

mod coordinator;
mod discovery;
mod fetcher;
mod headers;
mod limiter;

pub use coordinator::{CrawlOrchestrator, MirrorNode};
pub use discovery::{ResourceKind, Search, EMAIL_PATTERN, PHONE_PATTERN};
pub use fetcher::{
    build_http_client, classify_status, FetchedResource, Fetcher, ResponseVerdict, StatusClass,
};
pub use headers::{pick_user_agent, random_user_agents, request_headers};
pub use limiter::{Admission, RateLimiter, MAX_WORKERS};

use crate::config::Config;
use crate::output::CrawlStatistics;
use crate::Result;

/// Runs a complete mirror crawl
///
/// This is the main entry point for mirroring a site. It will:
/// 1. Build the HTTP client, rate limiter and session
/// 2. Fetch and store the start page
/// 3. Mirror every embedded resource and rewrite its reference
/// 4. Follow same-origin links level by level down to `max-depth`
/// 5. Write a markdown run summary under the storage root
pub async fn crawl(config: Config) -> Result<CrawlStatistics> {
    CrawlOrchestrator::new(config)?.run().await
}
