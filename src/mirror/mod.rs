//! Mirroring of fetched resources onto local storage
//!
//! - [`ResourceCache`] deduplicates downloads of query-string resources
//! - [`MirrorWriter`] decides where a resource lives locally and writes it
//! - [`paths`] holds the layout rules and relative-reference arithmetic

mod cache;
pub mod paths;
mod writer;

pub use cache::ResourceCache;
pub use paths::{
    compute_relative_reference, generate_unique_filename, generate_unique_id, page_location,
};
pub use writer::{DownloadOptions, DownloadRequest, MirrorWriter};

use std::path::PathBuf;
use url::Url;

/// How a resource record came about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Fetched and written during this call
    Downloaded,
    /// Served from the query-string cache without network I/O
    Cached,
    /// Already present on disk and left untouched
    Existing,
}

/// One mirrored resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// URL the resource was fetched from
    pub source_url: Url,
    /// Query string of the source URL (empty if none)
    pub query: String,
    /// Location relative to the storage root
    pub path: PathBuf,
    pub outcome: DownloadOutcome,
}
