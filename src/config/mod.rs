//! Configuration module for Site-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use site_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring {} to depth {}", config.mirror.start_url, config.mirror.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, Credentials, HttpConfig, LimiterConfig, MirrorConfig, PauseDuration, ScrapableEntry,
    TranslationConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{validate, validate_credentials, MAX_REQUEST_BUDGET, MIN_PAUSE_SECS};
