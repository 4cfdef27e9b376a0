//! Prefix-scoped key/value map over a [`StorageContext`].
//!
//! Layout:
//! - element: `prefix ++ encode(key)`
//! - count: `prefix ++ "{count}"` (little-endian `u64`)

use crate::storage::context::{join_key, StorageContext, StorageExt};
use crate::types::encoding::{Decode, DecodeError, Encode};

pub const COUNT_SUFFIX: &[u8] = b"{count}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMap {
    prefix: Vec<u8>,
}

impl StorageMap {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn element_key<K: Encode + ?Sized>(&self, key: &K) -> Vec<u8> {
        join_key(&self.prefix, &key.to_bytes())
    }

    pub fn count_key(&self) -> Vec<u8> {
        join_key(&self.prefix, COUNT_SUFFIX)
    }

    pub fn count(&self, storage: &dyn StorageContext) -> Result<u64, DecodeError> {
        Ok(storage.get_value::<u64>(&self.count_key())?.unwrap_or(0))
    }

    pub fn contains<K: Encode + ?Sized>(&self, storage: &dyn StorageContext, key: &K) -> bool {
        storage.has(&self.element_key(key))
    }

    pub fn get<K: Encode + ?Sized, V: Decode>(
        &self,
        storage: &dyn StorageContext,
        key: &K,
    ) -> Result<Option<V>, DecodeError> {
        storage.get_value(&self.element_key(key))
    }

    pub fn set<K: Encode + ?Sized, V: Encode + ?Sized>(
        &self,
        storage: &mut dyn StorageContext,
        key: &K,
        value: &V,
    ) -> Result<(), DecodeError> {
        let element = self.element_key(key);
        if !storage.has(&element) {
            let count = self.count(storage)?;
            storage.put_value(&self.count_key(), &(count + 1));
        }
        storage.put_value(&element, value);
        Ok(())
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove<K: Encode + ?Sized>(
        &self,
        storage: &mut dyn StorageContext,
        key: &K,
    ) -> Result<bool, DecodeError> {
        let element = self.element_key(key);
        if !storage.has(&element) {
            return Ok(false);
        }
        storage.delete(&element);
        let count = self.count(storage)?;
        storage.put_value(&self.count_key(), &count.saturating_sub(1));
        Ok(true)
    }

    /// Moves the value stored under `from` to `to`. Missing `from` is a no-op.
    pub fn migrate<K: Encode + ?Sized>(
        &self,
        storage: &mut dyn StorageContext,
        from: &K,
        to: &K,
    ) -> Result<(), DecodeError> {
        let source = self.element_key(from);
        let Some(value) = storage.get(&source) else {
            return Ok(());
        };
        self.remove(storage, from)?;
        let target = self.element_key(to);
        if !storage.has(&target) {
            let count = self.count(storage)?;
            storage.put_value(&self.count_key(), &(count + 1));
        }
        storage.put(&target, value);
        Ok(())
    }

    /// Raw `(encoded key, encoded value)` pairs, count key excluded.
    pub fn entries(&self, storage: &dyn StorageContext) -> Vec<(Vec<u8>, Vec<u8>)> {
        let count_key = self.count_key();
        storage
            .scan_prefix(&self.prefix)
            .into_iter()
            .filter(|(k, _)| *k != count_key)
            .map(|(k, v)| (k[self.prefix.len()..].to_vec(), v))
            .collect()
    }

    pub fn keys<K: Decode>(&self, storage: &dyn StorageContext) -> Result<Vec<K>, DecodeError> {
        self.entries(storage)
            .into_iter()
            .map(|(k, _)| K::from_bytes(&k))
            .collect()
    }

    pub fn values<V: Decode>(&self, storage: &dyn StorageContext) -> Result<Vec<V>, DecodeError> {
        self.entries(storage)
            .into_iter()
            .map(|(_, v)| V::from_bytes(&v))
            .collect()
    }

    pub fn clear(&self, storage: &mut dyn StorageContext) {
        for (key, _) in storage.scan_prefix(&self.prefix) {
            storage.delete(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::context::MemoryStorage;

    #[test]
    fn key_layout_is_prefix_plus_encoded_key() {
        let map = StorageMap::new("account._names");
        let mut expected = b"account._names".to_vec();
        expected.extend_from_slice(&[5, b'a', b'l', b'i', b'c', b'e']);
        assert_eq!(map.element_key("alice"), expected);
        assert_eq!(map.count_key(), b"account._names{count}".to_vec());
    }

    #[test]
    fn set_get_remove_track_count() {
        let mut storage = MemoryStorage::new();
        let map = StorageMap::new("m");
        map.set(&mut storage, "a", &1u32).unwrap();
        map.set(&mut storage, "b", &2u32).unwrap();
        map.set(&mut storage, "a", &3u32).unwrap();
        assert_eq!(map.count(&storage).unwrap(), 2);
        assert_eq!(map.get::<_, u32>(&storage, "a").unwrap(), Some(3));

        assert!(map.remove(&mut storage, "a").unwrap());
        assert!(!map.remove(&mut storage, "a").unwrap());
        assert_eq!(map.count(&storage).unwrap(), 1);
        assert!(!map.contains(&storage, "a"));
    }

    #[test]
    fn values_skip_the_count_entry() {
        let mut storage = MemoryStorage::new();
        let map = StorageMap::new("v");
        map.set(&mut storage, &1u8, &10u32).unwrap();
        map.set(&mut storage, &2u8, &20u32).unwrap();
        assert_eq!(map.values::<u32>(&storage).unwrap(), vec![10, 20]);
        assert_eq!(map.keys::<u8>(&storage).unwrap(), vec![1, 2]);
    }

    #[test]
    fn migrate_moves_value() {
        let mut storage = MemoryStorage::new();
        let map = StorageMap::new("s");
        map.set(&mut storage, &1u8, "script").unwrap();
        map.migrate(&mut storage, &1u8, &2u8).unwrap();
        assert_eq!(map.get::<_, String>(&storage, &2u8).unwrap().as_deref(), Some("script"));
        assert!(!map.contains(&storage, &1u8));
        assert_eq!(map.count(&storage).unwrap(), 1);
        map.migrate(&mut storage, &7u8, &8u8).unwrap();
        assert!(!map.contains(&storage, &8u8));
    }

    #[test]
    fn clear_removes_everything() {
        let mut storage = MemoryStorage::new();
        let map = StorageMap::new("c");
        map.set(&mut storage, &1u8, &1u8).unwrap();
        map.clear(&mut storage);
        assert!(storage.is_empty());
    }
}
