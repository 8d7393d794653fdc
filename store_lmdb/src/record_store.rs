//! LMDB implementation of RecordStore.

use std::sync::Arc;

use heed::types::{Bytes, Str};
use heed::Database;

use link_store::{RecordStore, StoreError, Updater, Visitor};

use crate::environment::{close_shared, Shared};
use crate::LmdbError;

/// Handle onto one named database of an [`crate::LmdbEnvironment`].
///
/// Cheap to clone; all clones share the environment, so closing any handle
/// closes every database in it.
#[derive(Clone)]
pub struct LmdbRecordStore {
    shared: Arc<Shared>,
    name: &'static str,
    db: Database<Str, Bytes>,
}

impl LmdbRecordStore {
    pub(crate) fn new(shared: Arc<Shared>, name: &'static str, db: Database<Str, Bytes>) -> Self {
        Self { shared, name, db }
    }

    /// Name of the underlying LMDB database.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of records currently stored.
    pub fn len(&self) -> Result<u64, StoreError> {
        self.shared.with_env(|env| {
            let rtxn = env.read_txn().map_err(LmdbError::from)?;
            let count = self.db.len(&rtxn).map_err(LmdbError::from)?;
            Ok(count)
        })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for LmdbRecordStore {
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.shared.with_env(|env| {
            let rtxn = env.read_txn().map_err(LmdbError::from)?;
            let val = self
                .db
                .get(&rtxn, key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::NotFound(key.to_string()))?;
            Ok(val.to_vec())
        })
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.shared.with_env(|env| {
            let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
            self.db
                .put(&mut wtxn, key, value)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
            Ok(())
        })
    }

    fn create(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        self.shared.with_env(|env| {
            let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
            if self.db.get(&wtxn, key).map_err(LmdbError::from)?.is_some() {
                return Ok(false);
            }
            self.db
                .put(&mut wtxn, key, value)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
            Ok(true)
        })
    }

    fn update(&self, key: &str, updater: &mut Updater<'_>) -> Result<(), StoreError> {
        self.shared.with_env(|env| {
            // LMDB admits one write transaction at a time, which serializes
            // concurrent updates of the same key.
            let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
            let next = {
                let current = self
                    .db
                    .get(&wtxn, key)
                    .map_err(LmdbError::from)?
                    .ok_or_else(|| LmdbError::NotFound(key.to_string()))?;
                updater(current)?
            };
            self.db
                .put(&mut wtxn, key, &next)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.shared.with_env(|env| {
            let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
            let existed = self
                .db
                .delete(&mut wtxn, key)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
            Ok(existed)
        })
    }

    fn range(&self, visit: &mut Visitor<'_>) -> Result<(), StoreError> {
        self.shared.with_env(|env| {
            let rtxn = env.read_txn().map_err(LmdbError::from)?;
            let iter = self.db.iter(&rtxn).map_err(LmdbError::from)?;
            let mut visited = 0usize;
            for entry in iter {
                match entry {
                    Ok((key, value)) => {
                        visited += 1;
                        if !visit(key, value) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            db = self.name,
                            visited,
                            error = %e,
                            "range aborted mid-iteration"
                        );
                        break;
                    }
                }
            }
            Ok(())
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        close_shared(&self.shared);
        Ok(())
    }
}
