//! URL handling module for Site-Mirror
//!
//! This module extracts the crawl origin, resolves raw attribute values found
//! in markup into absolute URLs, decides which URLs belong to the crawled site,
//! and knows which attribute of each tag carries a resource reference.

mod origin;
mod resolve;
mod tags;

// Re-export main functions
pub use origin::{base_origin, host_directory, is_same_origin, Origin};
pub use resolve::resolve_reference;
pub use tags::{attribute_for_tag, is_markup_path};
