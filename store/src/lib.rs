//! Abstract record storage for the link subsystem.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`RecordStore`]. The rest of the workspace depends only on the trait and
//! on the typed helpers in [`RecordStoreExt`].

pub mod cacheable;
pub mod error;
pub mod keys;
pub mod records;

pub use cacheable::{Cacheable, RecordStoreExt};
pub use error::StoreError;
pub use keys::{link_key, PIN_SNAPSHOT_KEY};
pub use records::{ChannelRecord, DataHashInfo};

/// Updater callback for [`RecordStore::update`]: receives the currently
/// stored bytes and returns the replacement bytes.
pub type Updater<'a> = dyn FnMut(&[u8]) -> Result<Vec<u8>, StoreError> + 'a;

/// Visitor callback for [`RecordStore::range`]. Returning `false` stops the
/// iteration.
pub type Visitor<'a> = dyn FnMut(&str, &[u8]) -> bool + 'a;

/// Transactional key/value store of opaque records.
///
/// Keys are hash identifiers (UTF-8 strings), values are serialisation-defined
/// byte blobs. Implementations must be safe to share across threads.
pub trait RecordStore: Send + Sync {
    /// Return the bytes stored under `key`, or [`StoreError::NotFound`].
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Unconditionally write `value` under `key`.
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Write `value` only if `key` is absent, checking and writing in one
    /// transaction. Returns whether it was written.
    fn create(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Read-modify-write `key` atomically.
    ///
    /// Fails with [`StoreError::NotFound`] when the key is absent; this never
    /// creates a key. Concurrent updates of the same key are serialized, so
    /// no update is lost. An error returned by `updater` aborts the write and
    /// is propagated unchanged.
    fn update(&self, key: &str, updater: &mut Updater<'_>) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether it was present.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Visit every record in key order against a point-in-time snapshot.
    ///
    /// A failure part-way through is logged and ends the iteration early;
    /// only failures before the first record is read (closed store, no
    /// snapshot) are returned. `visit` must not write to the same store.
    fn range(&self, visit: &mut Visitor<'_>) -> Result<(), StoreError>;

    /// Release the store. Idempotent; later operations fail with
    /// [`StoreError::StoreClosed`].
    fn close(&self) -> Result<(), StoreError>;
}
