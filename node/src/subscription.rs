//! Channel subscriptions: joining a known peer's channel.

use std::sync::Arc;

use link_network::{NetworkError, PeerDirectory, Transport};
use link_store::{Cacheable, ChannelRecord, RecordStore, RecordStoreExt, StoreError};
use link_types::PeerId;

use crate::NodeError;

pub struct Subscriber {
    transport: Arc<dyn Transport>,
    directory: Arc<PeerDirectory>,
    channels: Arc<dyn RecordStore>,
}

impl Subscriber {
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<PeerDirectory>,
        channels: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            transport,
            directory,
            channels,
        }
    }

    /// Connect to the peer `id` and record the subscription.
    ///
    /// The peer must already be in the directory. A failed connect counts
    /// as a failed interaction with it.
    pub async fn subscribe(&self, id: &str) -> Result<ChannelRecord, NodeError> {
        let peer = PeerId::parse(id)?;
        let entry = self
            .directory
            .entry(&peer)
            .ok_or_else(|| NetworkError::PeerNotFound(peer.to_string()))?;

        if let Err(e) = self.transport.connect(&entry.info).await {
            let outcome = self.directory.record_failure(&peer);
            tracing::warn!(peer = %peer, error = %e, ?outcome, "subscribe connect failed");
            return Err(e.into());
        }
        self.directory.record_success(&peer);

        let mut record = match self.channels.load_record::<ChannelRecord>(peer.as_str()) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => ChannelRecord {
                id: peer.to_string(),
                hash: String::new(),
                is_free: entry.flags.free,
                is_join: false,
            },
            Err(e) => return Err(e.into()),
        };
        record.is_join = true;
        self.channels.store_record(&record)?;
        self.directory.update_flags(&peer, |flags| flags.join = true);
        tracing::info!(peer = %peer, "subscribed");
        Ok(record)
    }

    /// Leave the channel of `id`. Fails with `NotFound` if never subscribed.
    pub fn unsubscribe(&self, id: &str) -> Result<(), NodeError> {
        let peer = PeerId::parse(id)?;
        self.channels
            .update_record::<ChannelRecord, _>(peer.as_str(), |record| record.is_join = false)?;
        self.directory.update_flags(&peer, |flags| flags.join = false);
        tracing::info!(peer = %peer, "unsubscribed");
        Ok(())
    }

    /// Channels currently joined, ordered by peer id.
    pub fn subscriptions(&self) -> Result<Vec<ChannelRecord>, NodeError> {
        let mut joined = Vec::new();
        self.channels.range(&mut |key, value| {
            match ChannelRecord::decode(value) {
                Ok(record) if record.is_join => joined.push(record),
                Ok(_) => {}
                Err(e) => tracing::warn!(key, error = %e, "skipping undecodable channel record"),
            }
            true
        })?;
        Ok(joined)
    }
}
