// crates/accrue-store/src/rocks.rs
//
// RocksDB-backed persistent store.
//
// Keys and values are opaque bytes supplied by the engine's typed
// collections. The default bytewise comparator gives the same ordering as
// `MemoryStore`, so prefix scans agree across backends.

use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};
use tracing::debug;

use accrue_core::{AccrueError, BatchOp, KvStore};

use crate::error::StoreError;

/// RocksDB wrapper implementing the `KvStore` trait.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, AccrueError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|source| {
            StoreError::Open {
                path: path.to_string(),
                source,
            }
        })?;
        debug!(path, "opened rocksdb store");

        Ok(Self { db })
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AccrueError> {
        Ok(self.db.get(key).map_err(StoreError::from)?)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), AccrueError> {
        Ok(self.db.put(key, value).map_err(StoreError::from)?)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), AccrueError> {
        Ok(self.db.delete(key).map_err(StoreError::from)?)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AccrueError> {
        let mut entries = Vec::new();

        for item in self.db.prefix_iterator(prefix) {
            let (key, value) = item.map_err(StoreError::from)?;

            // Without a prefix extractor the iterator runs past the prefix.
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }

        Ok(entries)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AccrueError> {
        let mut entries = Vec::new();

        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(StoreError::from)?;
            if &key[..] >= end {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }

        Ok(entries)
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> Result<(), AccrueError> {
        let mut batch = WriteBatch::default();
        for op in &ops {
            match op {
                BatchOp::Put { key, value } => batch.put(key, value),
                BatchOp::Delete { key } => batch.delete(key),
            }
        }
        self.db.write(batch).map_err(StoreError::from)?;
        debug!(ops = ops.len(), "committed batch");
        Ok(())
    }
}
