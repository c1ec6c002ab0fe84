use crate::storage::traits::{Storage, StorageError, StorageResult};
use std::path::Path;

/// Local filesystem storage
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for FsStorage {
    fn write_file(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        if path.file_name().is_none() {
            return Err(StorageError::InvalidPath(path.display().to_string()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, bytes).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        std::fs::read(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
