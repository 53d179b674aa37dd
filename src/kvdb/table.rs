//! Table view: a key-prefix-delimited namespace within a physical DB.
//!
//! All operations are transparently prefixed; yielded keys have the table
//! prefix stripped, so a table composes with further tables.

use crate::core::error::Result;
use crate::kvdb::{KvBatch, KvIter, KvStore};
use std::sync::Arc;

/// Prefix-scoped view of an underlying store.
pub struct Table {
    inner: Arc<dyn KvStore>,
    prefix: Vec<u8>,
}

impl Table {
    /// Scope `inner` to the keyspace under `prefix`.
    pub fn new(inner: Arc<dyn KvStore>, prefix: &[u8]) -> Self {
        Self {
            inner,
            prefix: prefix.to_vec(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl KvStore for Table {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&self.full_key(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.put(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.delete(&self.full_key(key))
    }

    fn iterator(&self, prefix: &[u8], start: &[u8]) -> KvIter<'_> {
        let strip = self.prefix.len();
        Box::new(
            self.inner
                .iterator(&self.full_key(prefix), start)
                .map(move |item| item.map(|(key, value)| (key[strip..].to_vec(), value))),
        )
    }

    fn batch(&self) -> Box<dyn KvBatch + '_> {
        Box::new(TableBatch {
            inner: self.inner.batch(),
            prefix: self.prefix.clone(),
        })
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.inner.stat(property)
    }

    fn compact(&self, start: &[u8], end: &[u8]) -> Result<()> {
        self.inner.compact(&self.full_key(start), &self.full_key(end))
    }
}

/// Batch that prefixes every buffered key.
struct TableBatch<'a> {
    inner: Box<dyn KvBatch + 'a>,
    prefix: Vec<u8>,
}

impl TableBatch<'_> {
    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl KvBatch for TableBatch<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let full = self.full_key(key);
        self.inner.put(&full, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let full = self.full_key(key);
        self.inner.delete(&full)
    }

    fn size_estimate(&self) -> usize {
        self.inner.size_estimate()
    }

    fn write(&mut self) -> Result<()> {
        self.inner.write()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
