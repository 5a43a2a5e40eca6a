// crates/accrue-store/src/lib.rs
//
// accrue-store: Storage layer for the Accrue reward engine.
//
// Provides three `KvStore` implementations: a BTreeMap-backed in-memory
// store, a write-buffering cache that overlays any other store and turns
// its pending writes into one atomic batch, and a RocksDB-backed persistent
// store.

pub mod cache;
pub mod error;
pub mod memory;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use cache::CacheStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use rocks::RocksStore;
