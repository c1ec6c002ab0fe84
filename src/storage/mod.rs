//! Storage module for persisting the mirror
//!
//! The crawler never touches the filesystem directly; mirrored pages and
//! resources go through the [`Storage`] trait so tests and alternative
//! backends can substitute their own implementation.

mod fs;
mod traits;

pub use fs::FsStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::sync::Arc;

/// Opens the default storage backend
pub fn open_storage() -> Arc<dyn Storage> {
    Arc::new(FsStorage::new())
}
