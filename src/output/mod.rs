//! Output module for crawl reports
//!
//! This module handles:
//! - Recording crawl statistics while workers run
//! - Writing the markdown run summary
//! - Exporting discovered URLs as CSV

mod export;
mod markdown;
pub mod stats;

pub use export::export_csv;
pub use markdown::{generate_markdown_summary, write_summary, RunSummary};
pub use stats::{print_statistics, CrawlStatistics, MirrorStats};
