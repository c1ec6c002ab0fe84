//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a mirror run,
//! written next to the mirrored pages at the end of the crawl.

use crate::output::CrawlStatistics;
use crate::Result;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Everything the run summary reports
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// SHA-256 of the configuration file, when the run was started from one
    pub config_hash: Option<String>,
    pub statistics: CrawlStatistics,
}

impl RunSummary {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

/// Writes the markdown summary of a run
///
/// # Arguments
///
/// * `path` - Where the markdown file should be written
/// * `summary` - The run to describe
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let markdown = generate_markdown_summary(summary);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn generate_markdown_summary(summary: &RunSummary) -> String {
    let stats = &summary.statistics;
    let mut md = String::new();

    md.push_str("# Site-Mirror Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Start URL**: {}\n", summary.start_url));
    md.push_str(&format!(
        "- **Started**: {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let duration = summary.duration_seconds();
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Pages\n\n");
    md.push_str(&format!("- **Pages Mirrored**: {}\n", stats.pages_mirrored));
    md.push_str(&format!("- **Levels Reached**: {}\n\n", stats.levels_reached));

    md.push_str("## Resources\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Downloaded | {} |\n", stats.resources_downloaded));
    md.push_str(&format!("| Reused from query cache | {} |\n", stats.cache_hits));
    md.push_str(&format!("| Already on disk | {} |\n", stats.existing_skipped));
    md.push_str(&format!("| Stale requests | {} |\n", stats.stale_requests));
    md.push_str(&format!("| Other failures | {} |\n", stats.failures));
    md.push('\n');

    md.push_str("---\n\n");
    md.push_str("*Generated by Site-Mirror*\n");

    md
}
