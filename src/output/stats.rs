//! Crawl statistics
//!
//! Counters are updated by crawl workers as they go and read once at the end
//! of the run through a [`CrawlStatistics`] snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by every worker of a crawl
#[derive(Debug, Default)]
pub struct MirrorStats {
    pages_mirrored: AtomicU64,
    resources_downloaded: AtomicU64,
    cache_hits: AtomicU64,
    existing_skipped: AtomicU64,
    stale_requests: AtomicU64,
    failures: AtomicU64,
    levels_reached: AtomicU64,
}

impl MirrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&self) {
        self.pages_mirrored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download(&self) {
        self.resources_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_existing(&self) {
        self.existing_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Any other per-resource or per-page failure that was skipped
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_levels_reached(&self, levels: u32) {
        self.levels_reached.store(levels as u64, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters
    pub fn snapshot(&self) -> CrawlStatistics {
        CrawlStatistics {
            pages_mirrored: self.pages_mirrored.load(Ordering::Relaxed),
            resources_downloaded: self.resources_downloaded.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            existing_skipped: self.existing_skipped.load(Ordering::Relaxed),
            stale_requests: self.stale_requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            levels_reached: self.levels_reached.load(Ordering::Relaxed),
        }
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Pages fetched, rewritten and saved
    pub pages_mirrored: u64,

    /// Resources fetched over the network and saved
    pub resources_downloaded: u64,

    /// Resources answered from the query-string cache
    pub cache_hits: u64,

    /// Resources already present in the mirror and not fetched again
    pub existing_skipped: u64,

    /// Requests abandoned after exhausting their retries
    pub stale_requests: u64,

    /// Other skipped failures (bad references, write errors)
    pub failures: u64,

    /// Deepest link level reached
    pub levels_reached: u64,
}

impl CrawlStatistics {
    /// Every resource reference that ended up pointing at a local file
    pub fn resources_mirrored(&self) -> u64 {
        self.resources_downloaded + self.cache_hits + self.existing_skipped
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Mirror Statistics ===\n");

    println!("Overview:");
    println!("  Pages mirrored: {}", stats.pages_mirrored);
    println!("  Levels reached: {}", stats.levels_reached);
    println!();

    println!("Resources:");
    println!("  Downloaded: {}", stats.resources_downloaded);
    println!("  Reused from query cache: {}", stats.cache_hits);
    println!("  Already on disk: {}", stats.existing_skipped);
    println!();

    if stats.stale_requests > 0 || stats.failures > 0 {
        println!("Skipped:");
        println!("  Stale requests: {}", stats.stale_requests);
        println!("  Other failures: {}", stats.failures);
        println!();
    }

    let attempted = stats.resources_mirrored() + stats.stale_requests + stats.failures;
    let success_rate = if attempted > 0 {
        (stats.resources_mirrored() as f64 / attempted as f64) * 100.0
    } else {
        100.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} resources mirrored)",
        success_rate,
        stats.resources_mirrored(),
        attempted
    );
}
