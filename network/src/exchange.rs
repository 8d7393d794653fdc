//! Consuming side of the link protocols.
//!
//! Every fetch is one interaction with the remote peer: it either fully
//! succeeds (stream opened, all records read and decoded within the
//! deadline) and resets the peer's failure counter, or it counts one
//! failure, which may evict the peer.

use std::sync::Arc;
use std::time::Duration;

use link_protocol::{decode_hash, decode_peer, read_records, ProtocolId, MAX_RECORDS};
use link_types::{PeerAddrInfo, PeerId};

use crate::{NetworkError, PeerDirectory, Transport};

pub struct ExchangeClient {
    transport: Arc<dyn Transport>,
    directory: Arc<PeerDirectory>,
    timeout: Duration,
}

impl ExchangeClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<PeerDirectory>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            directory,
            timeout,
        }
    }

    /// Ask `peer` for the peers it knows. New ones are added to the
    /// directory; known ones are left as they are.
    pub async fn fetch_peers(&self, peer: &PeerId) -> Result<Vec<PeerAddrInfo>, NetworkError> {
        let result = self.exchange(peer, &ProtocolId::peers()).await.and_then(|records| {
            records
                .iter()
                .map(|r| decode_peer(r).map_err(NetworkError::from))
                .collect::<Result<Vec<_>, _>>()
        });
        let infos = self.settle(peer, result)?;

        let local = self.transport.local_peer();
        let learned = infos
            .iter()
            .filter(|info| &info.id != local)
            .filter(|info| self.directory.learn((*info).clone()))
            .count();
        tracing::debug!(peer = %peer, received = infos.len(), learned, "peer exchange finished");
        Ok(infos)
    }

    /// Ask `peer` for the content hashes it has pinned.
    pub async fn fetch_hashes(&self, peer: &PeerId) -> Result<Vec<String>, NetworkError> {
        let result = self.exchange(peer, &ProtocolId::hash()).await.and_then(|records| {
            records
                .iter()
                .map(|r| decode_hash(r).map_err(NetworkError::from))
                .collect::<Result<Vec<_>, _>>()
        });
        let hashes = self.settle(peer, result)?;
        tracing::debug!(peer = %peer, received = hashes.len(), "hash exchange finished");
        Ok(hashes)
    }

    async fn exchange(
        &self,
        peer: &PeerId,
        protocol: &ProtocolId,
    ) -> Result<Vec<Vec<u8>>, NetworkError> {
        let session = async {
            let stream = self.transport.open_stream(peer, protocol).await?;
            let records = read_records(stream, MAX_RECORDS).await?;
            Ok::<_, NetworkError>(records)
        };
        match tokio::time::timeout(self.timeout, session).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                peer: peer.to_string(),
                after: self.timeout,
            }),
        }
    }

    fn settle<T>(&self, peer: &PeerId, result: Result<T, NetworkError>) -> Result<T, NetworkError> {
        match result {
            Ok(value) => {
                self.directory.record_success(peer);
                Ok(value)
            }
            Err(e) => {
                let outcome = self.directory.record_failure(peer);
                tracing::warn!(peer = %peer, error = %e, ?outcome, "exchange failed");
                Err(e)
            }
        }
    }
}
