//! Cached producer: memoizes open DB handles per name.
//!
//! Opening the same physical DB twice within a process must return the same
//! handle; engines hold file locks, and duplicate opens would fail or race.

use crate::core::error::Result;
use crate::kvdb::{DbProducer, KvStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Producer wrapper that returns a memoized handle per DB name.
pub struct CachedProducer {
    inner: Arc<dyn DbProducer>,
    cache: Mutex<HashMap<String, Arc<dyn KvStore>>>,
}

impl CachedProducer {
    /// Wrap `inner` with a per-name handle cache.
    pub fn new(inner: Arc<dyn DbProducer>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl DbProducer for CachedProducer {
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>> {
        let mut cache = self.cache.lock();
        if let Some(db) = cache.get(name) {
            return Ok(db.clone());
        }
        let db = self.inner.open_db(name)?;
        cache.insert(name.to_string(), db.clone());
        Ok(db)
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    fn destroy_db(&self, name: &str) -> Result<()> {
        self.cache.lock().remove(name);
        self.inner.destroy_db(name)
    }
}
