//! Site-Mirror main entry point
//!
//! This is the command-line interface for the Site-Mirror crawler.

use clap::{ArgGroup, Parser, ValueEnum};
use site_mirror::config::{load_config_with_hash, Config};
use site_mirror::crawler::{CrawlOrchestrator, ResourceKind, Search};
use site_mirror::document::TagFilter;
use site_mirror::output::{export_csv, print_statistics};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site-Mirror: a polite website mirroring crawler
///
/// Site-Mirror downloads a page together with the stylesheets, scripts, images
/// and fonts it embeds, rewrites their references to the local copies and
/// follows same-origin links down to a configured depth, all within a request
/// budget.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(version = "1.0.0")]
#[command(about = "A polite website mirroring crawler", long_about = None)]
#[command(group(
    ArgGroup::new("search")
        .args(["find", "find_pattern", "find_tags", "find_id", "find_class"])
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be mirrored without fetching anything
    #[arg(long, conflicts_with = "search")]
    dry_run: bool,

    /// Re-download files that already exist in the mirror
    #[arg(long)]
    overwrite: bool,

    /// Override the configured max-depth
    #[arg(long, value_name = "N")]
    depth: Option<u32>,

    /// List resource URLs, emails, phone numbers or comments instead of mirroring
    #[arg(long, value_enum, value_name = "KIND")]
    find: Option<FindKind>,

    /// List matches of a regular expression in page text and link targets
    #[arg(long, value_name = "REGEX")]
    find_pattern: Option<String>,

    /// List elements matching a tag filter, e.g. `div|class=note`
    #[arg(long, value_name = "FILTER")]
    find_tags: Option<TagFilter>,

    /// List elements with the given id
    #[arg(long, value_name = "ID")]
    find_id: Option<String>,

    /// List elements carrying the given class
    #[arg(long, value_name = "CLASS")]
    find_class: Option<String>,

    /// Write the results of a search to a CSV file
    #[arg(long, value_name = "FILE", requires = "search")]
    export: Option<PathBuf>,
}

/// What `--find` lists
#[derive(ValueEnum, Clone, Copy, Debug)]
enum FindKind {
    Links,
    Stylesheets,
    Scripts,
    Fonts,
    Images,
    Videos,
    Audios,
    Emails,
    PhoneNumbers,
    Comments,
}

impl From<FindKind> for Search {
    fn from(kind: FindKind) -> Self {
        match kind {
            FindKind::Links => Search::Urls(ResourceKind::Links),
            FindKind::Stylesheets => Search::Urls(ResourceKind::Stylesheets),
            FindKind::Scripts => Search::Urls(ResourceKind::Scripts),
            FindKind::Fonts => Search::Urls(ResourceKind::Fonts),
            FindKind::Images => Search::Urls(ResourceKind::Images),
            FindKind::Videos => Search::Urls(ResourceKind::Videos),
            FindKind::Audios => Search::Urls(ResourceKind::Audios),
            FindKind::Emails => Search::Emails,
            FindKind::PhoneNumbers => Search::PhoneNumbers,
            FindKind::Comments => Search::Comments,
        }
    }
}

impl Cli {
    /// The discovery search requested on the command line, if any
    fn search(&self) -> Option<Search> {
        if let Some(kind) = self.find {
            return Some(kind.into());
        }
        if let Some(pattern) = &self.find_pattern {
            return Some(Search::Pattern(pattern.clone()));
        }
        if let Some(filter) = &self.find_tags {
            return Some(Search::Tags(filter.clone()));
        }
        if let Some(id) = &self.find_id {
            return Some(Search::TagsById(id.clone()));
        }
        self.find_class.clone().map(Search::TagsByClass)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.overwrite {
        config.mirror.overwrite = true;
    }
    if let Some(depth) = cli.depth {
        config.mirror.max_depth = depth;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if let Some(search) = cli.search() {
        handle_find(config, search, cli.export).await?;
    } else {
        handle_mirror(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mirror=info,warn"),
            1 => EnvFilter::new("site_mirror=debug,info"),
            2 => EnvFilter::new("site_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Site-Mirror Dry Run ===\n");

    println!("Mirror:");
    println!("  Start URL: {}", config.mirror.start_url);
    println!("  Max depth: {}", config.mirror.max_depth);
    println!("  Storage root: {}", config.mirror.storage_root.display());
    if !config.mirror.storage_path.is_empty() {
        println!("  Entry page directory: {}", config.mirror.storage_path);
    }
    println!("  Markup filename: {}", config.mirror.markup_filename);
    println!("  Overwrite existing files: {}", config.mirror.overwrite);

    println!("\nLimiter:");
    println!("  Request budget: {}", config.limiter.request_budget);
    println!("  Pause duration: {:?}", config.pause());
    println!("  Max retries: {}", config.limiter.max_retries);

    let filters = config.scrapable_filters()?;
    println!("\nMirrored elements ({}):", filters.len());
    for filter in &filters {
        println!("  - {}", filter);
    }

    if let Some(credentials) = &config.credentials {
        println!("\nAuthentication:");
        println!("  Login URL: {}", credentials.auth_url);
        println!("  Username: {}", credentials.auth_username);
    }

    if let Some(translation) = &config.translation {
        println!("\nTranslation:");
        println!("  Engine: {}", translation.engine);
        println!("  Target language: {}", translation.target_language);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would mirror {} to depth {}",
        config.mirror.start_url, config.mirror.max_depth
    );

    Ok(())
}

/// Handles the discovery modes: lists what was found without mirroring
async fn handle_find(
    config: Config,
    search: Search,
    export: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = CrawlOrchestrator::new(config)?;
    let results = orchestrator.find(&search).await?;
    let heading = search.heading();

    match export {
        Some(path) => {
            export_csv(&path, &heading, &results)?;
            println!("✓ {} {} exported to: {}", results.len(), heading, path.display());
        }
        None => {
            for result in &results {
                println!("{}", result);
            }
        }
    }

    Ok(())
}

/// Handles the main mirror operation
async fn handle_mirror(config: Config, config_hash: String) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Mirroring {} into {}",
        config.mirror.start_url,
        config.mirror.storage_root.display()
    );

    let orchestrator = CrawlOrchestrator::new(config)?.with_config_hash(config_hash);

    match orchestrator.run().await {
        Ok(stats) => {
            tracing::info!("Mirror completed successfully");
            print_statistics(&stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            Err(e.into())
        }
    }
}
