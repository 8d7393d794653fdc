//! Record types persisted by the link subsystem.

use serde::{Deserialize, Serialize};

use link_types::PeerEntry;

use crate::{link_key, Cacheable};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Metadata for one piece of locally retained content, keyed by its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataHashInfo {
    pub data_hash: String,
    /// The content is pinned and announced over `/link/hash`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
}

impl DataHashInfo {
    pub fn new(data_hash: impl Into<String>) -> Self {
        Self {
            data_hash: data_hash.into(),
            pinned: false,
        }
    }

    pub fn hash(&self) -> &str {
        &self.data_hash
    }
}

impl Cacheable for DataHashInfo {
    fn cache_key(&self) -> String {
        self.data_hash.clone()
    }
}

/// Subscription bookkeeping for a remote peer's channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Peer id of the channel owner.
    pub id: String,
    /// Root hash of the channel content, when known.
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub is_join: bool,
}

impl Cacheable for ChannelRecord {
    fn cache_key(&self) -> String {
        self.id.clone()
    }
}

impl Cacheable for PeerEntry {
    fn cache_key(&self) -> String {
        link_key(self.id())
    }
}
