//! The canonical encode/decode capability for persisted records.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{RecordStore, StoreError};

/// A value that can be persisted in a [`RecordStore`].
///
/// Records are JSON-encoded by default so that stored blobs stay readable
/// with ordinary tooling (`{"data_hash":"Qm…"}`).
pub trait Cacheable: Serialize + DeserializeOwned {
    /// The key this record is stored under.
    fn cache_key(&self) -> String;

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Typed helpers over any [`RecordStore`].
pub trait RecordStoreExt: RecordStore {
    fn load_record<T: Cacheable>(&self, key: &str) -> Result<T, StoreError> {
        let bytes = self.load(key)?;
        T::decode(&bytes)
    }

    /// Write `record` under its own [`Cacheable::cache_key`].
    fn store_record<T: Cacheable>(&self, record: &T) -> Result<(), StoreError> {
        let bytes = record.encode()?;
        self.store(&record.cache_key(), &bytes)
    }

    /// Write `record` under its key unless one is already stored there.
    fn create_record<T: Cacheable>(&self, record: &T) -> Result<bool, StoreError> {
        let bytes = record.encode()?;
        self.create(&record.cache_key(), &bytes)
    }

    /// Decode the record under `key`, apply `mutate`, and write it back in
    /// one atomic update. Fails with [`StoreError::NotFound`] if absent.
    fn update_record<T, F>(&self, key: &str, mutate: F) -> Result<(), StoreError>
    where
        T: Cacheable,
        F: FnOnce(&mut T),
    {
        let mut mutate = Some(mutate);
        self.update(key, &mut |current| {
            let mut record = T::decode(current)?;
            if let Some(f) = mutate.take() {
                f(&mut record);
            }
            record.encode()
        })
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
