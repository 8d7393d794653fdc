//! Concurrent directory of known peers and their failure counters.
//!
//! All state sits behind one reader/writer lock: lookups and snapshots take
//! the shared side, mutations the exclusive side. The ordered snapshot handed
//! to the peer-exchange handler is cached as an `Arc<[PeerEntry]>` and only
//! rebuilt after a write, so concurrent exchanges share one allocation and
//! never hold the lock while writing to their streams.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use link_store::{link_key, Cacheable, RecordStore, RecordStoreExt, StoreError};
use link_types::{PeerAddrInfo, PeerEntry, PeerFlags, PeerId};

/// Result of [`PeerDirectory::record_failure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The peer is not in the directory; nothing was counted.
    Unknown,
    /// The failure was counted; the peer stays. Carries the new count.
    Counted(u32),
    /// The count exceeded the threshold and the peer was removed.
    Evicted,
}

struct Slot {
    entry: PeerEntry,
    failures: u32,
}

#[derive(Default)]
struct Inner {
    peers: BTreeMap<PeerId, Slot>,
    /// Evicted since the last flush; their backup rows are deleted then.
    evicted: BTreeSet<PeerId>,
    snapshot: Option<Arc<[PeerEntry]>>,
}

impl Inner {
    fn invalidate(&mut self) {
        self.snapshot = None;
    }
}

pub struct PeerDirectory {
    max_attempts: u32,
    inner: RwLock<Inner>,
}

impl PeerDirectory {
    /// A peer is evicted once more than `max_attempts` consecutive
    /// interactions with it have failed.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Add or replace the address info of `info.id`, resetting its failure
    /// counter. Flags of an existing entry are kept.
    pub fn upsert(&self, info: PeerAddrInfo) {
        let mut inner = self.inner.write();
        let id = info.id.clone();
        inner.evicted.remove(&id);
        match inner.peers.get_mut(&id) {
            Some(slot) => {
                slot.entry.info = info;
                slot.failures = 0;
            }
            None => {
                inner.peers.insert(
                    id,
                    Slot {
                        entry: PeerEntry::new(info),
                        failures: 0,
                    },
                );
            }
        }
        inner.invalidate();
    }

    /// Insert `info` only if the peer is unknown. Returns whether it was
    /// inserted. Known peers and their counters are left untouched.
    pub fn learn(&self, info: PeerAddrInfo) -> bool {
        if self.inner.read().peers.contains_key(&info.id) {
            return false;
        }
        let mut inner = self.inner.write();
        if inner.peers.contains_key(&info.id) {
            return false;
        }
        inner.evicted.remove(&info.id);
        inner.peers.insert(
            info.id.clone(),
            Slot {
                entry: PeerEntry::new(info),
                failures: 0,
            },
        );
        inner.invalidate();
        true
    }

    pub fn get(&self, id: &PeerId) -> Option<PeerAddrInfo> {
        self.inner.read().peers.get(id).map(|s| s.entry.info.clone())
    }

    pub fn entry(&self, id: &PeerId) -> Option<PeerEntry> {
        self.inner.read().peers.get(id).map(|s| s.entry.clone())
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.inner.read().peers.contains_key(id)
    }

    /// Replace the flags of a known peer. Returns `false` if it is unknown.
    pub fn set_flags(&self, id: &PeerId, flags: PeerFlags) -> bool {
        self.update_flags(id, |current| *current = flags)
    }

    /// Apply `f` to the current flags of a known peer under the write lock.
    /// Returns `false` if it is unknown.
    pub fn update_flags(&self, id: &PeerId, f: impl FnOnce(&mut PeerFlags)) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.peers.get_mut(id) else {
            return false;
        };
        let before = slot.entry.flags;
        f(&mut slot.entry.flags);
        if slot.entry.flags != before {
            inner.invalidate();
        }
        true
    }

    /// Point-in-time list of every entry, ordered by peer id.
    pub fn snapshot(&self) -> Arc<[PeerEntry]> {
        if let Some(snapshot) = &self.inner.read().snapshot {
            return Arc::clone(snapshot);
        }
        let mut inner = self.inner.write();
        if let Some(snapshot) = &inner.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot: Arc<[PeerEntry]> = inner.peers.values().map(|s| s.entry.clone()).collect();
        inner.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Count one failed interaction with `id`, evicting it when the count
    /// exceeds the threshold.
    pub fn record_failure(&self, id: &PeerId) -> FailureOutcome {
        let mut inner = self.inner.write();
        let Some(slot) = inner.peers.get_mut(id) else {
            return FailureOutcome::Unknown;
        };
        slot.failures = slot.failures.saturating_add(1);
        let failures = slot.failures;
        if failures <= self.max_attempts {
            tracing::debug!(peer = %id, failures, "peer interaction failed");
            return FailureOutcome::Counted(failures);
        }
        inner.peers.remove(id);
        inner.evicted.insert(id.clone());
        inner.invalidate();
        tracing::info!(peer = %id, failures, "evicted unreachable peer");
        FailureOutcome::Evicted
    }

    /// Reset the failure counter after a successful interaction.
    pub fn record_success(&self, id: &PeerId) {
        let mut inner = self.inner.write();
        if let Some(slot) = inner.peers.get_mut(id) {
            slot.failures = 0;
        }
    }

    /// Current consecutive failure count, or `None` for unknown peers.
    pub fn failure_count(&self, id: &PeerId) -> Option<u32> {
        self.inner.read().peers.get(id).map(|s| s.failures)
    }

    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete the rows of peers evicted since the previous flush, then
    /// persist every entry to `store` (keyed by [`link_key`]). Returns the
    /// number of entries written.
    pub fn flush_to(&self, store: &dyn RecordStore) -> Result<usize, StoreError> {
        let evicted = std::mem::take(&mut self.inner.write().evicted);
        for (deleted, id) in evicted.iter().enumerate() {
            if let Err(e) = store.delete(&link_key(id)) {
                let mut inner = self.inner.write();
                for id in evicted.iter().skip(deleted) {
                    if !inner.peers.contains_key(id) {
                        inner.evicted.insert(id.clone());
                    }
                }
                return Err(e);
            }
        }

        // Taken after the deletes so a peer relearned meanwhile keeps its row.
        let snapshot = self.snapshot();
        for entry in snapshot.iter() {
            store.store_record(entry)?;
        }
        Ok(snapshot.len())
    }

    /// Load entries persisted by [`Self::flush_to`]. Peers already present
    /// are kept as they are; rows that fail to decode are skipped. Returns
    /// the number of entries added.
    pub fn restore_from(&self, store: &dyn RecordStore) -> Result<usize, StoreError> {
        let mut loaded = Vec::new();
        store.range(&mut |key, value| {
            match PeerEntry::decode(value) {
                Ok(entry) => loaded.push(entry),
                Err(e) => tracing::warn!(key, error = %e, "skipping undecodable peer row"),
            }
            true
        })?;

        let mut inner = self.inner.write();
        let mut added = 0;
        for entry in loaded {
            if inner.peers.contains_key(entry.id()) {
                continue;
            }
            inner.peers.insert(
                entry.id().clone(),
                Slot {
                    entry,
                    failures: 0,
                },
            );
            added += 1;
        }
        if added > 0 {
            inner.invalidate();
        }
        Ok(added)
    }
}
