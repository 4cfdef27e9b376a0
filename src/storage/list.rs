//! Prefix-scoped indexed list over a [`StorageContext`].
//!
//! Layout:
//! - element: `prefix ++ "<" ++ encode(index as u64) ++ ">"`
//! - count: `prefix ++ "{count}"`
//!
//! Removal swaps the last element into the freed slot, so indices of other
//! elements may change.

use crate::storage::context::{join_key, StorageContext, StorageExt};
use crate::storage::map::COUNT_SUFFIX;
use crate::types::encoding::{Decode, DecodeError, Encode};
use nexus_derive::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("list index {index} out of range for {count} elements")]
    OutOfRange { index: u64, count: u64 },
    #[error("{0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageList {
    prefix: Vec<u8>,
}

impl StorageList {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn element_key(&self, index: u64) -> Vec<u8> {
        let mut key = join_key(&self.prefix, b"<");
        key.extend_from_slice(&index.to_bytes());
        key.push(b'>');
        key
    }

    pub fn count_key(&self) -> Vec<u8> {
        join_key(&self.prefix, COUNT_SUFFIX)
    }

    pub fn count(&self, storage: &dyn StorageContext) -> Result<u64, DecodeError> {
        Ok(storage.get_value::<u64>(&self.count_key())?.unwrap_or(0))
    }

    pub fn get<V: Decode>(&self, storage: &dyn StorageContext, index: u64) -> Result<V, ListError> {
        let count = self.count(storage)?;
        let value = match storage.get_value(&self.element_key(index))? {
            Some(value) if index < count => value,
            _ => return Err(ListError::OutOfRange { index, count }),
        };
        Ok(value)
    }

    /// Appends `value` and returns its index.
    pub fn add<V: Encode + ?Sized>(&self, storage: &mut dyn StorageContext, value: &V) -> Result<u64, DecodeError> {
        let index = self.count(storage)?;
        storage.put_value(&self.element_key(index), value);
        storage.put_value(&self.count_key(), &(index + 1));
        Ok(index)
    }

    pub fn replace<V: Encode + ?Sized>(
        &self,
        storage: &mut dyn StorageContext,
        index: u64,
        value: &V,
    ) -> Result<(), ListError> {
        let count = self.count(storage)?;
        if index >= count {
            return Err(ListError::OutOfRange { index, count });
        }
        storage.put_value(&self.element_key(index), value);
        Ok(())
    }

    pub fn remove_at(&self, storage: &mut dyn StorageContext, index: u64) -> Result<(), ListError> {
        let count = self.count(storage)?;
        if index >= count {
            return Err(ListError::OutOfRange { index, count });
        }
        let last = count - 1;
        if index != last {
            if let Some(moved) = storage.get(&self.element_key(last)) {
                storage.put(&self.element_key(index), moved);
            }
        }
        storage.delete(&self.element_key(last));
        storage.put_value(&self.count_key(), &last);
        Ok(())
    }

    pub fn contains<V: Encode + ?Sized>(&self, storage: &dyn StorageContext, value: &V) -> Result<bool, DecodeError> {
        Ok(self.index_of(storage, value)?.is_some())
    }

    pub fn index_of<V: Encode + ?Sized>(
        &self,
        storage: &dyn StorageContext,
        value: &V,
    ) -> Result<Option<u64>, DecodeError> {
        let needle = value.to_bytes();
        let count = self.count(storage)?;
        Ok((0..count).find(|&i| storage.get(&self.element_key(i)).as_deref() == Some(needle.as_slice())))
    }

    pub fn all<V: Decode>(&self, storage: &dyn StorageContext) -> Result<Vec<V>, ListError> {
        let count = self.count(storage)?;
        (0..count).map(|i| self.get(storage, i)).collect()
    }

    pub fn clear(&self, storage: &mut dyn StorageContext) -> Result<(), DecodeError> {
        let count = self.count(storage)?;
        for i in 0..count {
            storage.delete(&self.element_key(i));
        }
        storage.delete(&self.count_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::context::MemoryStorage;

    #[test]
    fn element_key_layout() {
        let list = StorageList::new("l");
        let mut expected = b"l<".to_vec();
        expected.extend_from_slice(&3u64.to_le_bytes());
        expected.push(b'>');
        assert_eq!(list.element_key(3), expected);
    }

    #[test]
    fn add_get_and_out_of_range() {
        let mut storage = MemoryStorage::new();
        let list = StorageList::new("l");
        assert_eq!(list.add(&mut storage, "a").unwrap(), 0);
        assert_eq!(list.add(&mut storage, "b").unwrap(), 1);
        assert_eq!(list.get::<String>(&storage, 1).unwrap(), "b");
        assert!(matches!(
            list.get::<String>(&storage, 2),
            Err(ListError::OutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn remove_swaps_last_into_slot() {
        let mut storage = MemoryStorage::new();
        let list = StorageList::new("l");
        for v in [1u32, 2, 3] {
            list.add(&mut storage, &v).unwrap();
        }
        list.remove_at(&mut storage, 0).unwrap();
        assert_eq!(list.all::<u32>(&storage).unwrap(), vec![3, 2]);
        assert!(list.contains(&storage, &2u32).unwrap());
        assert!(!list.contains(&storage, &1u32).unwrap());
    }

    #[test]
    fn replace_and_clear() {
        let mut storage = MemoryStorage::new();
        let list = StorageList::new("l");
        list.add(&mut storage, &1u8).unwrap();
        list.replace(&mut storage, 0, &9u8).unwrap();
        assert_eq!(list.get::<u8>(&storage, 0).unwrap(), 9);
        assert!(list.replace(&mut storage, 4, &1u8).is_err());
        list.clear(&mut storage).unwrap();
        assert!(storage.is_empty());
    }
}
