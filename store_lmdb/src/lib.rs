//! LMDB storage backend for the link subsystem.
//!
//! Implements [`link_store::RecordStore`] using the `heed` LMDB bindings.
//! One environment holds a named database per record family; each
//! [`LmdbRecordStore`] is a handle onto one of them.

pub mod environment;
pub mod error;
pub mod record_store;

pub use environment::{LmdbEnvironment, CHANNELS_DB, PEERS_DB, PINS_DB, RECORDS_DB};
pub use error::LmdbError;
pub use record_store::LmdbRecordStore;
