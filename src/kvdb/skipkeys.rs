//! Skip-keys wrapper: hides reserved metadata keys from iteration.
//!
//! Keys under the reserved metadata prefix (flush id, table list) stay
//! directly addressable through `get`/`put`, but never show up in iteration,
//! so application-level enumeration, snapshots, and exports cannot leak them.
//! The prefix is injected at construction.

use crate::core::error::Result;
use crate::kvdb::{DbProducer, KvBatch, KvIter, KvStore};
use std::sync::Arc;

/// Store wrapper that filters reserved keys out of iteration.
pub struct SkipKeysStore {
    inner: Arc<dyn KvStore>,
    skip_prefix: Vec<u8>,
}

impl SkipKeysStore {
    /// Wrap `inner`, hiding keys under `skip_prefix` from iteration.
    pub fn new(inner: Arc<dyn KvStore>, skip_prefix: &[u8]) -> Self {
        Self {
            inner,
            skip_prefix: skip_prefix.to_vec(),
        }
    }
}

impl KvStore for SkipKeysStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.delete(key)
    }

    fn iterator(&self, prefix: &[u8], start: &[u8]) -> KvIter<'_> {
        let skip = self.skip_prefix.clone();
        Box::new(self.inner.iterator(prefix, start).filter(move |item| {
            match item {
                Ok((key, _)) => !key.starts_with(&skip),
                Err(_) => true,
            }
        }))
    }

    fn batch(&self) -> Box<dyn KvBatch + '_> {
        self.inner.batch()
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.inner.stat(property)
    }

    fn compact(&self, start: &[u8], end: &[u8]) -> Result<()> {
        self.inner.compact(start, end)
    }
}

/// Producer wrapper applying [`SkipKeysStore`] to every opened DB.
pub struct SkipKeysProducer {
    inner: Arc<dyn DbProducer>,
    skip_prefix: Vec<u8>,
}

impl SkipKeysProducer {
    /// Wrap `inner`, hiding keys under `skip_prefix` in every opened store.
    pub fn new(inner: Arc<dyn DbProducer>, skip_prefix: &[u8]) -> Self {
        Self {
            inner,
            skip_prefix: skip_prefix.to_vec(),
        }
    }
}

impl DbProducer for SkipKeysProducer {
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>> {
        let db = self.inner.open_db(name)?;
        Ok(Arc::new(SkipKeysStore::new(db, &self.skip_prefix)))
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    fn destroy_db(&self, name: &str) -> Result<()> {
        self.inner.destroy_db(name)
    }
}
