//! Nullable store: thread-safe in-memory record storage.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use link_store::{RecordStore, StoreError, Updater, Visitor};

/// An in-memory [`RecordStore`] with the same contract as the LMDB one:
/// ordered keys, serialized updates, snapshot ranges, idempotent close.
#[derive(Default)]
pub struct NullStore {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
    closed: AtomicBool,
    unavailable: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`StoreError::Backend`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::StoreClosed);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".into()));
        }
        Ok(())
    }
}

impl RecordStore for NullStore {
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check()?;
        self.records
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check()?;
        self.records.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn create(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        self.check()?;
        match self.records.write().entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(true)
            }
        }
    }

    fn update(&self, key: &str, updater: &mut Updater<'_>) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.write();
        let current = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let next = updater(current.as_slice())?;
        *current = next;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.records.write().remove(key).is_some())
    }

    fn range(&self, visit: &mut Visitor<'_>) -> Result<(), StoreError> {
        self.check()?;
        let snapshot = self.records.read().clone();
        for (key, value) in &snapshot {
            if !visit(key, value) {
                break;
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_never_creates() {
        let store = NullStore::new();
        let err = store.update("QmA", &mut |_| Ok(b"x".to_vec())).unwrap_err();
        assert_eq!(err, StoreError::NotFound("QmA".into()));
        assert!(store.is_empty());
    }

    #[test]
    fn create_keeps_existing_value() {
        let store = NullStore::new();
        assert!(store.create("QmA", b"first").unwrap());
        assert!(!store.create("QmA", b"second").unwrap());
        assert_eq!(store.load("QmA").unwrap(), b"first".to_vec());
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = NullStore::new();
        store.store("QmA", b"x").unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert_eq!(store.load("QmA").unwrap_err(), StoreError::StoreClosed);
    }

    #[test]
    fn unavailable_store_fails_with_backend_error() {
        let store = NullStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.range(&mut |_, _| true), Err(StoreError::Backend(_))));
        store.set_unavailable(false);
        assert!(store.range(&mut |_, _| true).is_ok());
    }
}
