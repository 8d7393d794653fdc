//! Content hash records and their pin flags.

use std::sync::Arc;

use link_store::{Cacheable, DataHashInfo, RecordStore, RecordStoreExt, StoreError};

use crate::pinning::PinSource;
use crate::NodeError;

/// Typed access to the `records` store.
pub struct ContentCache {
    records: Arc<dyn RecordStore>,
}

impl ContentCache {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Mark `hash` as pinned, creating its record if needed.
    pub fn pin(&self, hash: &str) -> Result<(), NodeError> {
        link_protocol::encode_hash(hash)?;
        let set_pinned = |info: &mut DataHashInfo| info.pinned = true;
        match self.records.update_record::<DataHashInfo, _>(hash, set_pinned) {
            Err(StoreError::NotFound(_)) => {
                let mut info = DataHashInfo::new(hash);
                info.pinned = true;
                if !self.records.create_record(&info)? {
                    // Created concurrently since the update; pin that record.
                    self.records.update_record::<DataHashInfo, _>(hash, set_pinned)?;
                }
            }
            other => other?,
        }
        tracing::debug!(hash, "pinned content");
        Ok(())
    }

    /// Clear the pin flag. Fails with `NotFound` for unknown hashes.
    pub fn unpin(&self, hash: &str) -> Result<(), NodeError> {
        self.records
            .update_record::<DataHashInfo, _>(hash, |info| info.pinned = false)?;
        tracing::debug!(hash, "unpinned content");
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Result<Option<DataHashInfo>, NodeError> {
        match self.records.load_record(hash) {
            Ok(info) => Ok(Some(info)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put(&self, info: &DataHashInfo) -> Result<(), NodeError> {
        link_protocol::encode_hash(info.hash())?;
        self.records.store_record(info)?;
        Ok(())
    }

    pub fn remove(&self, hash: &str) -> Result<bool, NodeError> {
        Ok(self.records.delete(hash)?)
    }
}

impl PinSource for ContentCache {
    fn pinned_hashes(&self) -> Result<Vec<String>, StoreError> {
        let mut pinned = Vec::new();
        self.records.range(&mut |key, value| {
            match DataHashInfo::decode(value) {
                Ok(info) if info.pinned => match link_protocol::encode_hash(info.hash()) {
                    Ok(_) => pinned.push(info.data_hash),
                    Err(e) => tracing::warn!(key, error = %e, "skipping unannounceable pin"),
                },
                Ok(_) => {}
                Err(e) => tracing::warn!(key, error = %e, "skipping undecodable content record"),
            }
            true
        })?;
        Ok(pinned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_nullables::NullStore;

    fn cache() -> (Arc<NullStore>, ContentCache) {
        let store = Arc::new(NullStore::new());
        let cache = ContentCache::new(Arc::clone(&store) as Arc<dyn RecordStore>);
        (store, cache)
    }

    #[test]
    fn pin_creates_then_updates() {
        let (_store, cache) = cache();
        cache.put(&DataHashInfo::new("QmA")).unwrap();
        cache.pin("QmA").unwrap();
        cache.pin("QmB").unwrap();

        assert!(cache.get("QmA").unwrap().unwrap().pinned);
        assert!(cache.get("QmB").unwrap().unwrap().pinned);
        assert_eq!(cache.pinned_hashes().unwrap(), vec!["QmA", "QmB"]);
    }

    #[test]
    fn unpin_unknown_hash_is_not_found() {
        let (store, cache) = cache();
        let err = cache.unpin("QmMissing").unwrap_err();
        assert!(matches!(err, NodeError::Store(StoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn unpinned_records_are_not_announced() {
        let (_store, cache) = cache();
        cache.pin("QmA").unwrap();
        cache.unpin("QmA").unwrap();
        assert!(cache.pinned_hashes().unwrap().is_empty());
        assert!(cache.get("QmA").unwrap().is_some());
    }

    #[test]
    fn invalid_hash_is_rejected() {
        let (store, cache) = cache();
        assert!(matches!(cache.pin("Qm A"), Err(NodeError::Protocol(_))));
        let mut info = DataHashInfo::new("Qm A");
        info.pinned = true;
        assert!(matches!(cache.put(&info), Err(NodeError::Protocol(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn pin_keeps_record_created_by_put() {
        let (store, cache) = cache();
        store.store("QmA", br#"{"data_hash":"QmA"}"#).unwrap();
        cache.pin("QmA").unwrap();
        assert_eq!(
            store.load("QmA").unwrap(),
            br#"{"data_hash":"QmA","pinned":true}"#.to_vec()
        );
    }

    #[test]
    fn invalid_stored_pins_are_skipped() {
        let (store, cache) = cache();
        store
            .store("QmA bad", br#"{"data_hash":"QmA bad","pinned":true}"#)
            .unwrap();
        cache.pin("QmB").unwrap();
        assert_eq!(cache.pinned_hashes().unwrap(), vec!["QmB"]);
    }
}
