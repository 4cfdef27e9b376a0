//! Byte-keyed storage and the transactional change set layered over it.

use crate::types::encoding::{Decode, DecodeError, Encode};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered byte-key to byte-value store.
pub trait StorageContext {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn put(&mut self, key: &[u8], value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Every entry whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// Typed access on top of [`StorageContext`].
pub trait StorageExt: StorageContext {
    fn get_value<T: Decode>(&self, key: &[u8]) -> Result<Option<T>, DecodeError> {
        self.get(key).map(|bytes| T::from_bytes(&bytes)).transpose()
    }

    fn put_value<T: Encode + ?Sized>(&mut self, key: &[u8], value: &T) {
        self.put(key, value.to_bytes());
    }
}

impl<S: StorageContext + ?Sized> StorageExt for S {}

/// Concatenates a key prefix with a suffix.
pub fn join_key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

fn prefix_range(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    (Bound::Included(prefix.to_vec()), Bound::Unbounded)
}

/// In-memory [`StorageContext`] backed by a `BTreeMap`.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the writes produced by [`ChangeSet::into_writes`].
    pub fn apply(&mut self, writes: Vec<(Vec<u8>, Option<Vec<u8>>)>) {
        for (key, value) in writes {
            match value {
                Some(value) => {
                    self.data.insert(key, value);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl StorageContext for MemoryStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.data.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }

    fn has(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .range::<Vec<u8>, _>(prefix_range(prefix))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Position in a [`ChangeSet`] journal that writes can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

type Slot = Option<Vec<u8>>;

/// Write buffer over a read-only base.
///
/// Reads fall through to the base for keys not yet written. Every write is
/// journaled with the overlay slot it replaced, so [`ChangeSet::rollback_to`]
/// can undo everything after a [`Checkpoint`]. Nothing reaches the base
/// until the caller applies [`ChangeSet::into_writes`].
pub struct ChangeSet<'a> {
    base: &'a dyn StorageContext,
    /// `Some(value)` for insertions, `None` for deletions.
    writes: BTreeMap<Vec<u8>, Slot>,
    /// Previous overlay slot of each written key; `None` when the key was untouched.
    journal: Vec<(Vec<u8>, Option<Slot>)>,
}

impl<'a> ChangeSet<'a> {
    pub fn new(base: &'a dyn StorageContext) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Undoes every write made after `checkpoint`.
    pub fn rollback_to(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some((key, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(slot) => {
                    self.writes.insert(key, slot);
                }
                None => {
                    self.writes.remove(&key);
                }
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Consumes the change set and returns the pending writes in key order.
    pub fn into_writes(self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.writes.into_iter().collect()
    }

    fn record(&mut self, key: &[u8], slot: Slot) {
        let previous = self.writes.insert(key.to_vec(), slot);
        self.journal.push((key.to_vec(), previous));
    }
}

impl StorageContext for ChangeSet<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(slot) => slot.clone(),
            None => self.base.get(key),
        }
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.record(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.record(key, None);
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.base.scan_prefix(prefix).into_iter().collect();
        for (key, slot) in self
            .writes
            .range::<Vec<u8>, _>(prefix_range(prefix))
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match slot {
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
}
