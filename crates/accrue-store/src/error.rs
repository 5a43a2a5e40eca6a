// crates/accrue-store/src/error.rs

use accrue_core::AccrueError;
use thiserror::Error;

/// Backend failures raised inside the store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("Failed to open RocksDB at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rocksdb::Error,
    },
}

impl From<StoreError> for AccrueError {
    fn from(e: StoreError) -> Self {
        AccrueError::Storage(e.to_string())
    }
}
