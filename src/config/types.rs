use crate::document::TagFilter;
use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Site-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scrapable: Vec<ScrapableEntry>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub translation: Option<TranslationConfig>,
}

impl Config {
    /// Builds a configuration for `start_url` with every other setting defaulted
    pub fn for_url(start_url: impl Into<String>) -> Self {
        Self {
            mirror: MirrorConfig {
                start_url: start_url.into(),
                max_depth: 0,
                markup_filename: default_markup_filename(),
                storage_root: default_storage_root(),
                storage_path: String::new(),
                overwrite: false,
            },
            limiter: LimiterConfig::default(),
            http: HttpConfig::default(),
            scrapable: Vec::new(),
            credentials: None,
            translation: None,
        }
    }

    /// Effective pause taken once the request budget is spent
    pub fn pause(&self) -> Duration {
        self.limiter
            .pause_duration
            .resolve(self.limiter.request_budget)
    }

    /// The mirrorable element table, falling back to the built-in one
    pub fn scrapable_filters(&self) -> ConfigResult<Vec<TagFilter>> {
        if self.scrapable.is_empty() {
            return Ok(TagFilter::defaults());
        }

        self.scrapable
            .iter()
            .map(|entry| match entry {
                ScrapableEntry::Compact(spec) => spec.parse(),
                ScrapableEntry::Table { tag, attrs } => {
                    if tag.trim().is_empty() {
                        return Err(ConfigError::InvalidFilter(
                            "scrapable tag cannot be empty".to_string(),
                        ));
                    }
                    Ok(TagFilter::with_attrs(
                        tag,
                        attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    ))
                }
            })
            .collect()
    }
}

/// What to mirror and where to put it
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Page the crawl starts from; its origin becomes the session origin
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Number of link levels to follow below the start page (0 = start page only)
    #[serde(rename = "max-depth", default)]
    pub max_depth: u32,

    /// Filename given to mirrored pages that have no filename of their own
    #[serde(rename = "markup-filename", default = "default_markup_filename")]
    pub markup_filename: String,

    /// Root directory of the mirror
    #[serde(rename = "storage-root", default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Directory of the entry page, relative to the storage root
    #[serde(rename = "storage-path", default)]
    pub storage_path: String,

    /// Re-download files that already exist in the mirror
    #[serde(default)]
    pub overwrite: bool,
}

/// Request budget and retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Requests allowed per window before the crawl pauses
    #[serde(rename = "request-budget", default = "default_request_budget")]
    pub request_budget: u32,

    /// How long the crawl pauses once the budget is spent
    #[serde(rename = "pause-duration", default)]
    pub pause_duration: PauseDuration,

    /// Error responses tolerated for a single URL before it is declared stale
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            request_budget: default_request_budget(),
            pause_duration: PauseDuration::Auto,
            max_retries: default_max_retries(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Length of the pause taken when the request budget runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawPause")]
pub enum PauseDuration {
    /// Derived from the request budget
    #[default]
    Auto,
    /// A fixed pause
    Fixed(Duration),
}

impl PauseDuration {
    /// Resolves the pause for a given request budget
    ///
    /// `Auto` yields `max(ceil(0.542 * budget), 5)` seconds.
    pub fn resolve(&self, budget: u32) -> Duration {
        match self {
            Self::Auto => {
                let secs = (0.542 * budget as f64).ceil() as u64;
                Duration::from_secs(secs.max(5))
            }
            Self::Fixed(duration) => *duration,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPause {
    Seconds(u64),
    Keyword(String),
}

impl TryFrom<RawPause> for PauseDuration {
    type Error = String;

    fn try_from(raw: RawPause) -> Result<Self, Self::Error> {
        match raw {
            RawPause::Seconds(secs) => Ok(Self::Fixed(Duration::from_secs(secs))),
            RawPause::Keyword(word) if word.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            RawPause::Keyword(word) => Err(format!(
                "pause-duration must be \"auto\" or a number of seconds, got '{}'",
                word
            )),
        }
    }
}

/// One entry of the mirrorable element table
///
/// Either a compact `"tag|attr=value"` string or a `{ tag, attrs }` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScrapableEntry {
    Compact(String),
    Table {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
    },
}

/// Login form credentials
///
/// Keys follow the snake_case names accepted on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub auth_url: String,
    pub auth_username_field: String,
    pub auth_password_field: String,
    pub auth_username: String,
    pub auth_password: String,
    #[serde(default)]
    pub additional_auth_fields: BTreeMap<String, String>,
}

/// Optional translation of mirrored pages
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    /// Language code pages are translated into
    #[serde(rename = "target-language")]
    pub target_language: String,

    #[serde(default = "default_engine")]
    pub engine: String,

    /// Translation endpoint of the engine
    pub endpoint: String,

    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,
}

fn default_markup_filename() -> String {
    "index.html".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./mirror")
}

fn default_request_budget() -> u32 {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_engine() -> String {
    "libretranslate".to_string()
}
