//! An in-memory store.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::storage::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
    StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: Mutex<BTreeMap<StoreKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new, empty, memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of values in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.lock().len()
    }

    /// Returns true if the store holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.lock().is_empty()
    }

    /// All keys in the store, in lexicographical order.
    #[must_use]
    pub fn keys(&self) -> StoreKeys {
        self.data_map.lock().keys().cloned().collect()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.lock().get(key).cloned())
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self
            .data_map
            .lock()
            .get(key)
            .map(|value| value.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.data_map.lock().insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.lock().remove(key);
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys: StoreKeys = vec![];
        let mut prefixes: BTreeSet<StorePrefix> = BTreeSet::default();
        let data_map = self.data_map.lock();
        for key in data_map.keys().filter(|key| key.has_prefix(prefix)) {
            let key_strip = &key.as_str()[prefix.as_str().len()..];
            match key_strip.split_once('/') {
                Some((directory, _)) => {
                    prefixes.insert(prefix.child(directory)?);
                }
                None => keys.push(key.clone()),
            }
        }
        Ok(StoreKeysPrefixes::new(keys, prefixes.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_get_erase() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let key = StoreKey::new("a/b")?;
        assert_eq!(store.get(&key)?, None);
        store.set(&key, &[0, 1, 2])?;
        assert_eq!(store.get(&key)?, Some(vec![0, 1, 2]));
        assert_eq!(store.size_key(&key)?, Some(3));
        assert!(store.exists(&key)?);
        store.erase(&key)?;
        assert!(!store.exists(&key)?);
        store.erase(&key)?;
        Ok(())
    }

    #[test]
    fn memory_list_dir() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&StoreKey::new(".zgroup")?, &[])?;
        store.set(&StoreKey::new("a/.zarray")?, &[])?;
        store.set(&StoreKey::new("a/0.0")?, &[])?;
        store.set(&StoreKey::new("b/c/.zgroup")?, &[])?;

        let root = store.list_dir(&StorePrefix::root())?;
        assert_eq!(root.keys(), &[StoreKey::new(".zgroup")?]);
        assert_eq!(
            root.prefixes(),
            &[StorePrefix::new("a/")?, StorePrefix::new("b/")?]
        );

        let a = store.list_dir(&StorePrefix::new("a/")?)?;
        assert_eq!(a.keys(), &[StoreKey::new("a/.zarray")?, StoreKey::new("a/0.0")?]);
        assert!(a.prefixes().is_empty());
        Ok(())
    }
}
