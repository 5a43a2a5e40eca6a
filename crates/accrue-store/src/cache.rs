// crates/accrue-store/src/cache.rs
//
// CacheStore: write-buffering overlay over another store.
//
// Reads fall through to the parent unless the key has a pending write.
// Writes and deletes are buffered (a delete is a `None` tombstone) and never
// reach the parent directly. `into_batch` hands the buffered writes back as
// one `BatchOp` list so the caller can commit them atomically; dropping the
// cache discards them.

use std::collections::BTreeMap;
use std::ops::Bound;

use accrue_core::{AccrueError, BatchOp, KvStore};

pub struct CacheStore<'a, S: KvStore> {
    parent: &'a S,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore> CacheStore<'a, S> {
    pub fn new(parent: &'a S) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// Number of buffered writes (puts and deletes).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consume the cache, returning its writes in key order.
    pub fn into_batch(self) -> Vec<BatchOp> {
        self.pending
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOp::Put { key, value },
                None => BatchOp::Delete { key },
            })
            .collect()
    }
}

/// Apply pending writes on top of a parent scan.
fn merge<'p>(
    base: Vec<(Vec<u8>, Vec<u8>)>,
    overlay: impl Iterator<Item = (&'p Vec<u8>, &'p Option<Vec<u8>>)>,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = base.into_iter().collect();
    for (key, value) in overlay {
        match value {
            Some(value) => {
                merged.insert(key.clone(), value.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }
    merged.into_iter().collect()
}

impl<'a, S: KvStore> KvStore for CacheStore<'a, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AccrueError> {
        match self.pending.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), AccrueError> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), AccrueError> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AccrueError> {
        let overlay = self
            .pending
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        Ok(merge(self.parent.scan_prefix(prefix)?, overlay))
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AccrueError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let overlay = self
            .pending
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)));
        Ok(merge(self.parent.scan_range(start, end)?, overlay))
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> Result<(), AccrueError> {
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    self.pending.insert(key, Some(value));
                }
                BatchOp::Delete { key } => {
                    self.pending.insert(key, None);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn parent() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(b"p1", b"a").unwrap();
        store.set(b"p2", b"b").unwrap();
        store.set(b"q1", b"c").unwrap();
        store
    }

    #[test]
    fn test_reads_fall_through_until_overwritten() {
        let base = parent();
        let mut cache = CacheStore::new(&base);
        assert_eq!(cache.get(b"p1").unwrap(), Some(b"a".to_vec()));

        cache.set(b"p1", b"z").unwrap();
        cache.delete(b"p2").unwrap();
        assert_eq!(cache.get(b"p1").unwrap(), Some(b"z".to_vec()));
        assert_eq!(cache.get(b"p2").unwrap(), None);
        // parent untouched
        assert_eq!(base.get(b"p2").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_scan_merges_pending_writes() {
        let base = parent();
        let mut cache = CacheStore::new(&base);
        cache.delete(b"p1").unwrap();
        cache.set(b"p3", b"d").unwrap();
        cache.set(b"q2", b"e").unwrap();

        let keys: Vec<Vec<u8>> = cache
            .scan_prefix(b"p")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p2".to_vec(), b"p3".to_vec()]);
    }

    #[test]
    fn test_range_scan_merges_pending_writes() {
        let base = parent();
        let mut cache = CacheStore::new(&base);
        cache.delete(b"p2").unwrap();
        cache.set(b"p5", b"d").unwrap();
        cache.set(b"q0", b"e").unwrap();

        let keys: Vec<Vec<u8>> = cache
            .scan_range(b"p1", b"q1")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p1".to_vec(), b"p5".to_vec(), b"q0".to_vec()]);
    }

    #[test]
    fn test_into_batch_commits_to_parent() {
        let mut base = parent();
        let batch = {
            let mut cache = CacheStore::new(&base);
            cache.set(b"new", b"1").unwrap();
            cache.delete(b"q1").unwrap();
            assert_eq!(cache.pending_len(), 2);
            cache.into_batch()
        };
        base.write_batch(batch).unwrap();
        assert_eq!(base.get(b"new").unwrap(), Some(b"1".to_vec()));
        assert_eq!(base.get(b"q1").unwrap(), None);
    }

    #[test]
    fn test_nested_caches_stack() {
        let base = parent();
        let mut outer = CacheStore::new(&base);
        outer.set(b"p1", b"outer").unwrap();
        let batch = {
            let mut inner = CacheStore::new(&outer);
            assert_eq!(inner.get(b"p1").unwrap(), Some(b"outer".to_vec()));
            inner.set(b"p1", b"inner").unwrap();
            inner.into_batch()
        };
        outer.write_batch(batch).unwrap();
        assert_eq!(outer.get(b"p1").unwrap(), Some(b"inner".to_vec()));
    }
}
