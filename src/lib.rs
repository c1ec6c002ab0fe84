//! Site-Mirror: a polite, depth-bounded website mirroring crawler
//!
//! This crate fetches a starting page, downloads the resources it embeds
//! (stylesheets, scripts, images, fonts), rewrites their references to point at
//! the local copies, and follows same-origin links down to a configured depth,
//! all while honoring a request budget against the remote server.

pub mod config;
pub mod crawler;
pub mod document;
pub mod mirror;
pub mod output;
pub mod state;
pub mod storage;
pub mod translate;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Request to {url} went stale after exhausting its retries")]
    StaleRequest { url: String },

    #[error("Authentication against {url} failed (status: {status:?})")]
    AuthenticationFailed { url: String, status: Option<u16> },

    #[error("File error: {0}")]
    File(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Language '{code}' is not supported by the {engine} engine")]
    UnsupportedLanguage { code: String, engine: String },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Markup rewrite error: {0}")]
    Rewrite(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// Returns true if the error only affects a single resource or page
    ///
    /// Local errors are logged and skipped by the crawl; anything else aborts it.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::StaleRequest { .. }
                | Self::File(_)
                | Self::Storage(_)
                | Self::Translation(_)
                | Self::Rewrite(_)
                | Self::Validation(_)
                | Self::Reqwest(_)
                | Self::Io(_)
                | Self::UrlError(_)
                | Self::UrlParse(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Invalid tag filter: {0}")]
    InvalidFilter(String),

    #[error("Language '{code}' is not supported by the {engine} engine")]
    UnsupportedLanguage { code: String, engine: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL (missing scheme or host): {0}")]
    InvalidUrl(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for Site-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::CrawlOrchestrator;
pub use state::CrawlSession;
pub use crate::url::{base_origin, is_same_origin, resolve_reference, Origin};
