//! Key-value store abstraction.
//!
//! Every storage backend (rocksdb, in-memory, any future engine) is exposed
//! through the same narrow contract: [`KvStore`] for one physical database,
//! [`KvBatch`] for buffered atomic writes, and [`DbProducer`] for opening,
//! enumerating, and destroying databases of one backend type under a root
//! directory. Backends are selected by a type tag at configuration time;
//! nothing above this module knows which engine it is talking to.
//!
//! Closing a store is dropping its handle; irreversible deletion goes through
//! [`DbProducer::destroy_db`].
//!
//! # Wrappers
//!
//! - [`table`] - key-prefix-delimited namespace view of a store
//! - [`flushable`] - buffered writes plus the dirty/clean flush-id protocol
//! - [`cached`] - per-name memoization of open handles
//! - [`skipkeys`] - hides reserved metadata keys from iteration

pub mod cached;
pub mod flushable;
pub mod memory;
pub mod rocks;
pub mod skipkeys;
pub mod table;

use crate::core::error::Result;
use std::sync::Arc;

// Re-exports for convenience
pub use cached::CachedProducer;
pub use flushable::{Flushable, SyncedPool};
pub use memory::{MemProducer, MemStore};
pub use rocks::{RocksProducer, RocksStore};
pub use skipkeys::{SkipKeysProducer, SkipKeysStore};
pub use table::Table;

/// One key-value entry, owned.
pub type KvEntry = (Vec<u8>, Vec<u8>);

/// Iterator over entries in byte-lexicographic key order.
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<KvEntry>> + 'a>;

/// One physical key-value database.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key` if present.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Iterate entries whose keys start with `prefix`, beginning at
    /// `prefix ++ start`, in byte-lexicographic key order. Yielded keys are
    /// full keys (prefix included).
    fn iterator(&self, prefix: &[u8], start: &[u8]) -> KvIter<'_>;

    /// Create a write batch against this store.
    fn batch(&self) -> Box<dyn KvBatch + '_>;

    /// Read an engine statistic by property name.
    fn stat(&self, property: &str) -> Result<String>;

    /// Compact the key range `[start, end)`.
    fn compact(&self, start: &[u8], end: &[u8]) -> Result<()>;
}

/// Buffered writes with an atomic commit.
///
/// Whether the commit is truly atomic depends on the backend; engines with a
/// native batch (rocksdb) commit all-or-nothing, the rest apply sequentially.
pub trait KvBatch {
    /// Buffer a put.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Buffer a delete.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Rough byte size of the buffered operations.
    fn size_estimate(&self) -> usize;

    /// Commit the buffered operations and clear the batch.
    fn write(&mut self) -> Result<()>;

    /// Discard the buffered operations.
    fn reset(&mut self);
}

/// Opens, enumerates, and destroys databases of one backend type.
pub trait DbProducer: Send + Sync {
    /// Open the database `name`, creating it if missing.
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>>;

    /// Names of the databases that currently exist under this producer.
    fn names(&self) -> Vec<String>;

    /// Irreversibly delete the database `name`.
    ///
    /// All handles to it must have been dropped.
    fn destroy_db(&self, name: &str) -> Result<()>;
}
