//! In-memory backend.
//!
//! Backs tests and the `inmemory` data-dir mode. Iterators observe a snapshot
//! taken at creation time, matching the snapshot semantics of the rocksdb
//! backend, so copy loops may commit batches mid-iteration.

use crate::core::error::{Result, StrataError};
use crate::kvdb::{DbProducer, KvBatch, KvIter, KvStore};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, reserved keys included.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn iterator(&self, prefix: &[u8], start: &[u8]) -> KvIter<'_> {
        let mut from = prefix.to_vec();
        from.extend_from_slice(start);
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .map
            .read()
            .range(from..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(snapshot.into_iter().map(Ok))
    }

    fn batch(&self) -> Box<dyn KvBatch + '_> {
        Box::new(MemBatch {
            store: self,
            ops: Vec::new(),
            size: 0,
        })
    }

    fn stat(&self, property: &str) -> Result<String> {
        match property {
            "entries" => Ok(self.map.read().len().to_string()),
            _ => Err(StrataError::backend(format!(
                "unknown memory stat property {:?}",
                property
            ))),
        }
    }

    fn compact(&self, _start: &[u8], _end: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Write batch over a [`MemStore`]; applies under a single lock.
struct MemBatch<'a> {
    store: &'a MemStore,
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    size: usize,
}

impl KvBatch for MemBatch<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.size += key.len() + value.len();
        self.ops.push((key.to_vec(), Some(value.to_vec())));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.size += key.len();
        self.ops.push((key.to_vec(), None));
        Ok(())
    }

    fn size_estimate(&self) -> usize {
        self.size
    }

    fn write(&mut self) -> Result<()> {
        let mut map = self.store.map.write();
        for (key, value) in self.ops.drain(..) {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        self.size = 0;
        Ok(())
    }

    fn reset(&mut self) {
        self.ops.clear();
        self.size = 0;
    }
}

/// Producer of in-memory databases, keyed by name.
#[derive(Debug, Default)]
pub struct MemProducer {
    dbs: Mutex<HashMap<String, Arc<MemStore>>>,
}

impl MemProducer {
    /// Create an empty producer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DbProducer for MemProducer {
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>> {
        let mut dbs = self.dbs.lock();
        let db = dbs
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemStore::new()));
        Ok(db.clone())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dbs.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn destroy_db(&self, name: &str) -> Result<()> {
        self.dbs.lock().remove(name);
        Ok(())
    }
}
