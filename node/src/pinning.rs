//! Published set of locally pinned content hashes.
//!
//! The tracker recomputes the pin set on each refresh and swaps in a new
//! immutable [`PinSnapshot`]. Readers hold an `Arc` to the snapshot they
//! were given, so an announce in flight keeps its view even while a newer
//! one is published.

use std::sync::Arc;

use parking_lot::RwLock;

use link_store::{RecordStore, StoreError, PIN_SNAPSHOT_KEY};

/// Where the tracker gets the current pin set from.
pub trait PinSource: Send + Sync {
    fn pinned_hashes(&self) -> Result<Vec<String>, StoreError>;
}

/// Immutable, ordered pin set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PinSnapshot {
    hashes: Vec<String>,
    generation: u64,
}

impl PinSnapshot {
    /// Sorts and deduplicates `hashes`.
    pub fn new(mut hashes: Vec<String>, generation: u64) -> Self {
        hashes.sort();
        hashes.dedup();
        Self { hashes, generation }
    }

    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.hashes.iter()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.binary_search_by(|h| h.as_str().cmp(hash)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Number of refreshes (or restores) that preceded this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<'a> IntoIterator for &'a PinSnapshot {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.hashes.iter()
    }
}

pub struct PinningTracker {
    source: Arc<dyn PinSource>,
    current: RwLock<Arc<PinSnapshot>>,
}

impl PinningTracker {
    /// Starts out publishing an empty snapshot.
    pub fn new(source: Arc<dyn PinSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(PinSnapshot::default())),
        }
    }

    /// The most recently published snapshot.
    pub fn get(&self) -> Arc<PinSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Recompute the pin set and publish it. On failure the previous
    /// snapshot stays published.
    pub fn refresh(&self) -> Result<Arc<PinSnapshot>, StoreError> {
        let hashes = self.source.pinned_hashes()?;
        let snapshot = self.publish(hashes);
        tracing::debug!(
            pins = snapshot.len(),
            generation = snapshot.generation(),
            "refreshed pin snapshot"
        );
        Ok(snapshot)
    }

    /// Write the current snapshot under [`PIN_SNAPSHOT_KEY`].
    pub fn persist(&self, store: &dyn RecordStore) -> Result<usize, StoreError> {
        let snapshot = self.get();
        let bytes = bincode::serialize(snapshot.hashes())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        store.store(PIN_SNAPSHOT_KEY, &bytes)?;
        Ok(snapshot.len())
    }

    /// Publish the snapshot saved by [`Self::persist`]. Returns `false` when
    /// nothing was saved.
    pub fn restore(&self, store: &dyn RecordStore) -> Result<bool, StoreError> {
        let bytes = match store.load(PIN_SNAPSHOT_KEY) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let hashes: Vec<String> = bincode::deserialize(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let snapshot = self.publish(hashes);
        tracing::debug!(pins = snapshot.len(), "restored pin snapshot");
        Ok(true)
    }

    fn publish(&self, hashes: Vec<String>) -> Arc<PinSnapshot> {
        let mut current = self.current.write();
        let snapshot = Arc::new(PinSnapshot::new(hashes, current.generation() + 1));
        *current = Arc::clone(&snapshot);
        snapshot
    }
}
