//! Integration tests for Site-Mirror
//!
//! These tests run the crawler against wiremock servers and mirror into
//! temporary directories.

mod common;
mod crawl_tests;
mod discovery_tests;
mod fetch_tests;
