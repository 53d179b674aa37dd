//! Flushable wrapper and the dirty/clean flush-id protocol.
//!
//! [`Flushable`] buffers writes in memory; reads and iteration observe the
//! buffer merged over the underlying store. [`SyncedPool`] manages all
//! flushables of one backend type and implements the crash-consistency
//! protocol: a flush first marks every member DB dirty under the reserved
//! flush-id key, then applies every buffer, then marks every member clean
//! with the same id. A DB found without the key, or with a dirty marker, is
//! evidence of a torn write; the whole DB set is then untrusted (see
//! `core::runtime`).
//!
//! The flush-id value is `[marker byte][8-byte big-endian id]`, the id being
//! wall-clock nanoseconds at flush time.

use crate::core::error::{Result, StrataError};
use crate::kvdb::{DbProducer, KvBatch, KvEntry, KvIter, KvStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Marker byte of a completed flush.
pub const CLEAN_MARKER: u8 = 0x00;

/// Marker byte of a flush in progress.
pub const DIRTY_MARKER: u8 = 0x01;

/// Flush batches larger than this are committed in chunks.
const MAX_BATCH_BYTES: usize = 8 * 1024 * 1024;

/// Encode a flush-id value.
pub fn flush_id_value(marker: u8, id: u64) -> Vec<u8> {
    let mut value = Vec::with_capacity(9);
    value.push(marker);
    value.extend_from_slice(&id.to_be_bytes());
    value
}

/// Check whether a flush-id value carries the clean marker.
pub fn is_clean(value: &[u8]) -> bool {
    value.first() == Some(&CLEAN_MARKER)
}

/// Current wall-clock time in nanoseconds, used as a monotonically
/// increasing flush id across node restarts.
pub fn current_flush_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Store wrapper that buffers writes until the next pool flush.
pub struct Flushable {
    inner: Arc<dyn KvStore>,
    buf: Mutex<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    size: AtomicUsize,
}

impl Flushable {
    /// Wrap `inner` with a write buffer.
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self {
            inner,
            buf: Mutex::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Estimated byte size of the not-yet-flushed buffer.
    pub fn not_flushed_size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Apply the buffered writes to the underlying store and clear the
    /// buffer. Large buffers are committed in chunks.
    pub fn flush(&self) -> Result<()> {
        let mut buf = self.buf.lock();
        let mut batch = self.inner.batch();
        for (key, value) in buf.iter() {
            match value {
                Some(value) => batch.put(key, value)?,
                None => batch.delete(key)?,
            }
            if batch.size_estimate() >= MAX_BATCH_BYTES {
                batch.write()?;
            }
        }
        batch.write()?;
        buf.clear();
        self.size.store(0, Ordering::Release);
        Ok(())
    }

    fn buffer(&self, key: &[u8], value: Option<Vec<u8>>) {
        let added = key.len() + value.as_ref().map_or(0, Vec::len);
        let mut buf = self.buf.lock();
        if let Some(old) = buf.insert(key.to_vec(), value) {
            let removed = key.len() + old.map_or(0, |v| v.len());
            self.size.fetch_sub(removed, Ordering::AcqRel);
        }
        self.size.fetch_add(added, Ordering::AcqRel);
    }
}

impl KvStore for Flushable {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(buffered) = self.buf.lock().get(key) {
            return Ok(buffered.clone());
        }
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.buffer(key, Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.buffer(key, None);
        Ok(())
    }

    fn iterator(&self, prefix: &[u8], start: &[u8]) -> KvIter<'_> {
        let mut from = prefix.to_vec();
        from.extend_from_slice(start);
        let overlay: Vec<(Vec<u8>, Option<Vec<u8>>)> = {
            let buf = self.buf.lock();
            buf.range(from..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        Box::new(MergedIter {
            base: self.inner.iterator(prefix, start).peekable(),
            overlay: overlay.into_iter().peekable(),
        })
    }

    fn batch(&self) -> Box<dyn KvBatch + '_> {
        Box::new(FlushableBatch {
            target: self,
            ops: Vec::new(),
            size: 0,
        })
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.inner.stat(property)
    }

    fn compact(&self, start: &[u8], end: &[u8]) -> Result<()> {
        self.inner.compact(start, end)
    }
}

/// Merge of the underlying iterator with the buffered overlay.
///
/// On equal keys the overlay wins; buffered deletions hide base entries.
struct MergedIter<'a> {
    base: std::iter::Peekable<KvIter<'a>>,
    overlay: std::iter::Peekable<std::vec::IntoIter<(Vec<u8>, Option<Vec<u8>>)>>,
}

enum Pick {
    Base,
    Overlay,
    Both,
}

impl Iterator for MergedIter<'_> {
    type Item = Result<KvEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let pick = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(Err(_)), _) => return self.base.next(),
                (Some(Ok(_)), None) => Pick::Base,
                (None, Some(_)) => Pick::Overlay,
                (Some(Ok((base_key, _))), Some((overlay_key, _))) => {
                    match base_key.cmp(overlay_key) {
                        std::cmp::Ordering::Less => Pick::Base,
                        std::cmp::Ordering::Greater => Pick::Overlay,
                        std::cmp::Ordering::Equal => Pick::Both,
                    }
                }
            };
            match pick {
                Pick::Base => return self.base.next(),
                Pick::Overlay | Pick::Both => {
                    if matches!(pick, Pick::Both) {
                        self.base.next();
                    }
                    if let Some((key, Some(value))) = self.overlay.next() {
                        return Some(Ok((key, value)));
                    }
                    // Buffered deletion: skip and continue.
                }
            }
        }
    }
}

/// Batch over a [`Flushable`]; committing moves the operations into the
/// write buffer, not the underlying store.
struct FlushableBatch<'a> {
    target: &'a Flushable,
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    size: usize,
}

impl KvBatch for FlushableBatch<'_> {
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
        for (key, value) in self.ops.drain(..) {
            self.target.buffer(&key, value);
        }
        self.size = 0;
        Ok(())
    }

    fn reset(&mut self) {
        self.ops.clear();
        self.size = 0;
    }
}

struct PoolMember {
    raw: Arc<dyn KvStore>,
    wrapped: Arc<Flushable>,
}

/// Pool of flushable DBs of one backend type, flushed as a unit under the
/// dirty/clean protocol.
pub struct SyncedPool {
    inner: Arc<dyn DbProducer>,
    flush_id_key: Vec<u8>,
    members: Mutex<HashMap<String, Arc<PoolMember>>>,
}

impl SyncedPool {
    /// Create a pool over `inner`, using `flush_id_key` as the reserved
    /// flush-id key in every member DB.
    pub fn new(inner: Arc<dyn DbProducer>, flush_id_key: Vec<u8>) -> Self {
        Self {
            inner,
            flush_id_key,
            members: Mutex::new(HashMap::new()),
        }
    }

    fn member(&self, name: &str) -> Result<Arc<PoolMember>> {
        let mut members = self.members.lock();
        if let Some(member) = members.get(name) {
            return Ok(member.clone());
        }
        let raw = self.inner.open_db(name)?;
        let member = Arc::new(PoolMember {
            raw: raw.clone(),
            wrapped: Arc::new(Flushable::new(raw)),
        });
        members.insert(name.to_string(), member.clone());
        Ok(member)
    }

    /// Open every existing DB and verify the flush-id protocol state.
    ///
    /// Every member must carry a clean flush id, and all ids (including
    /// `prev`, threaded through pools of other backend types) must agree.
    /// Returns the common flush-id value.
    pub fn initialize(
        &self,
        names: &[String],
        mut prev: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>> {
        for name in names {
            let member = self.member(name)?;
            let value = member.raw.get(&self.flush_id_key)?.ok_or_else(|| {
                StrataError::torn_write(format!("DB {:?} has no flush id", name))
            })?;
            if !is_clean(&value) {
                return Err(StrataError::torn_write(format!(
                    "DB {:?} was not flushed cleanly",
                    name
                )));
            }
            if let Some(prev_value) = prev.as_ref() {
                if *prev_value != value {
                    return Err(StrataError::torn_write(format!(
                        "DB {:?} flush id diverges from the rest of the DB set",
                        name
                    )));
                }
            }
            prev = Some(value);
        }
        Ok(prev)
    }

    /// Flush every member: mark dirty, apply all buffers, mark clean.
    pub fn flush(&self, id: u64) -> Result<()> {
        let members: Vec<(String, Arc<PoolMember>)> = self
            .members
            .lock()
            .iter()
            .map(|(name, member)| (name.clone(), member.clone()))
            .collect();
        for (_, member) in &members {
            member
                .raw
                .put(&self.flush_id_key, &flush_id_value(DIRTY_MARKER, id))?;
        }
        for (name, member) in &members {
            member.wrapped.flush()?;
            tracing::debug!(db = %name, "flushed write buffer");
        }
        for (_, member) in &members {
            member
                .raw
                .put(&self.flush_id_key, &flush_id_value(CLEAN_MARKER, id))?;
        }
        Ok(())
    }

    /// Estimated byte size of all not-yet-flushed buffers.
    pub fn not_flushed_size(&self) -> usize {
        self.members
            .lock()
            .values()
            .map(|m| m.wrapped.not_flushed_size())
            .sum()
    }
}

impl DbProducer for SyncedPool {
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>> {
        Ok(self.member(name)?.wrapped.clone())
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    fn destroy_db(&self, name: &str) -> Result<()> {
        self.members.lock().remove(name);
        self.inner.destroy_db(name)
    }
}
