//! LMDB environment setup and shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use parking_lot::RwLock;

use crate::{LmdbError, LmdbRecordStore};

/// Content hash records (`DataHashInfo`), keyed by hash.
pub const RECORDS_DB: &str = "records";
/// Peer directory backup, keyed by `link_key(peer)`.
pub const PEERS_DB: &str = "peers";
/// Channel subscription bookkeeping, keyed by peer id.
pub const CHANNELS_DB: &str = "channels";
/// Last published pin snapshot.
pub const PINS_DB: &str = "pins";

const DATABASES: &[&str] = &[RECORDS_DB, PEERS_DB, CHANNELS_DB, PINS_DB];

/// State shared by the environment and every record store handle.
///
/// Each operation holds a read guard on `env` for its whole duration, so
/// taking the write guard in [`LmdbEnvironment::close`] waits for in-flight
/// transactions to finish.
pub(crate) struct Shared {
    env: RwLock<Option<Env>>,
    path: PathBuf,
}

impl Shared {
    /// Run `f` against the open environment, or fail with `Closed`.
    pub(crate) fn with_env<T, E>(&self, f: impl FnOnce(&Env) -> Result<T, E>) -> Result<T, E>
    where
        E: From<LmdbError>,
    {
        // Recursive so a range visitor on this thread cannot deadlock against
        // a queued close.
        let guard = self.env.read_recursive();
        let env = guard.as_ref().ok_or(LmdbError::Closed)?;
        f(env)
    }
}

/// Wraps the LMDB environment and all database handles.
#[derive(Clone)]
pub struct LmdbEnvironment {
    shared: Arc<Shared>,
    records: LmdbRecordStore,
    peers: LmdbRecordStore,
    channels: LmdbRecordStore,
    pins: LmdbRecordStore,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment under `path`, creating the
    /// directory and all named databases if they do not exist yet.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per path by this process and
        // is never memory-mapped by anything else while open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut handles: Vec<Database<Str, Bytes>> = Vec::with_capacity(DATABASES.len());
        for name in DATABASES {
            handles.push(env.create_database(&mut wtxn, Some(*name))?);
        }
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");

        let shared = Arc::new(Shared {
            env: RwLock::new(Some(env)),
            path: path.to_path_buf(),
        });
        let store = |idx: usize| {
            LmdbRecordStore::new(Arc::clone(&shared), DATABASES[idx], handles[idx])
        };

        Ok(Self {
            records: store(0),
            peers: store(1),
            channels: store(2),
            pins: store(3),
            shared,
        })
    }

    pub fn records(&self) -> &LmdbRecordStore {
        &self.records
    }

    pub fn peers(&self) -> &LmdbRecordStore {
        &self.peers
    }

    pub fn channels(&self) -> &LmdbRecordStore {
        &self.channels
    }

    pub fn pins(&self) -> &LmdbRecordStore {
        &self.pins
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn is_closed(&self) -> bool {
        self.shared.env.read().is_none()
    }

    /// Close the environment once every in-flight operation has finished.
    ///
    /// Idempotent. Every [`LmdbRecordStore`] handle fails with
    /// `StoreClosed` afterwards.
    pub fn close(&self) {
        close_shared(&self.shared);
    }
}

/// Take the environment out of `shared` and wait for LMDB to release it.
pub(crate) fn close_shared(shared: &Shared) {
    let env = shared.env.write().take();
    if let Some(env) = env {
        env.prepare_for_closing().wait();
        tracing::info!(path = %shared.path.display(), "closed LMDB environment");
    }
}
