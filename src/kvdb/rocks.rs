//! RocksDB backend.
//!
//! One physical DB is one rocksdb instance in its own directory under the
//! producer root. The block cache is sized per DB name through the `[cache]`
//! configuration table.

use crate::core::config::DbCacheConfig;
use crate::core::error::{Result, StrataError};
use crate::kvdb::{DbProducer, KvBatch, KvIter, KvStore};
use rocksdb::{BlockBasedOptions, Cache, Direction, IteratorMode, Options, DB};
use std::path::PathBuf;
use std::sync::Arc;

/// Key-value store over one rocksdb instance.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a rocksdb database at `path`.
    pub fn open(path: &PathBuf, cache_bytes: u64) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        if cache_bytes > 0 {
            let mut block_opts = BlockBasedOptions::default();
            let cache = Cache::new_lru_cache(cache_bytes as usize);
            block_opts.set_block_cache(&cache);
            opts.set_block_based_table_factory(&block_opts);
        }
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        Ok(self.db.delete(key)?)
    }

    fn iterator(&self, prefix: &[u8], start: &[u8]) -> KvIter<'_> {
        let mut from = prefix.to_vec();
        from.extend_from_slice(start);
        let prefix = prefix.to_vec();
        let inner = self
            .db
            .iterator(IteratorMode::From(&from, Direction::Forward));
        Box::new(
            inner
                .take_while(move |item| match item {
                    Ok((key, _)) => key.starts_with(&prefix),
                    Err(_) => true,
                })
                .map(|item| {
                    item.map(|(key, value)| (key.into_vec(), value.into_vec()))
                        .map_err(StrataError::from)
                }),
        )
    }

    fn batch(&self) -> Box<dyn KvBatch + '_> {
        Box::new(RocksBatch {
            db: &self.db,
            batch: rocksdb::WriteBatch::default(),
        })
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.db
            .property_value(property)?
            .ok_or_else(|| StrataError::backend(format!("unknown rocksdb property {:?}", property)))
    }

    fn compact(&self, start: &[u8], end: &[u8]) -> Result<()> {
        self.db.compact_range(Some(start), Some(end));
        Ok(())
    }
}

/// Native rocksdb write batch; the commit is atomic.
struct RocksBatch<'a> {
    db: &'a DB,
    batch: rocksdb::WriteBatch,
}

impl KvBatch for RocksBatch<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.batch.put(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.batch.delete(key);
        Ok(())
    }

    fn size_estimate(&self) -> usize {
        self.batch.size_in_bytes()
    }

    fn write(&mut self) -> Result<()> {
        let batch = std::mem::take(&mut self.batch);
        Ok(self.db.write(batch)?)
    }

    fn reset(&mut self) {
        self.batch.clear();
    }
}

/// Producer of rocksdb databases under one root directory.
pub struct RocksProducer {
    root: PathBuf,
    cache: DbCacheConfig,
}

impl RocksProducer {
    /// Create a producer rooted at `root`; the directory is created lazily on
    /// the first open.
    pub fn new(root: PathBuf, cache: DbCacheConfig) -> Self {
        Self { root, cache }
    }

    fn db_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl DbProducer for RocksProducer {
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>> {
        std::fs::create_dir_all(&self.root)?;
        let store = RocksStore::open(&self.db_path(name), self.cache.resolve(name))?;
        Ok(Arc::new(store))
    }

    fn names(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    fn destroy_db(&self, name: &str) -> Result<()> {
        let path = self.db_path(name);
        DB::destroy(&Options::default(), &path)?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
