//! State module for tracking a crawl run
//!
//! # Components
//!
//! - `CrawlSession`: origin, depth progress, authentication state and storage
//!   root of one mirror run

mod session;

// Re-export main types
pub use session::CrawlSession;
