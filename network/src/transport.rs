//! The transport seam: addressable bidirectional streams between peers.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use link_protocol::ProtocolId;
use link_types::{PeerAddrInfo, PeerId};

use crate::NetworkError;

/// A bidirectional byte stream opened under one protocol id.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {
    /// Identity of the peer on the other end.
    fn remote_peer(&self) -> &PeerId;
}

pub type BoxedStream = Box<dyn LinkStream>;

/// Invoked by the transport once per inbound stream, each on its own task.
pub type StreamHandler = Arc<dyn Fn(BoxedStream) -> BoxFuture<'static, ()> + Send + Sync>;

/// What the link subsystem needs from the underlying peer-to-peer network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity of the local node.
    fn local_peer(&self) -> &PeerId;

    /// Route inbound streams for `protocol` to `handler`.
    fn set_stream_handler(
        &self,
        protocol: &ProtocolId,
        handler: StreamHandler,
    ) -> Result<(), NetworkError>;

    /// Stop routing `protocol`. A no-op when nothing is registered.
    fn remove_stream_handler(&self, protocol: &ProtocolId);

    /// Open an outbound stream to `peer` under `protocol`.
    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: &ProtocolId,
    ) -> Result<BoxedStream, NetworkError>;

    /// Dial `info` so later streams to it succeed.
    async fn connect(&self, info: &PeerAddrInfo) -> Result<(), NetworkError>;

    /// Currently connected peers with the addresses they were reached on.
    fn connected_peers(&self) -> Vec<PeerAddrInfo>;
}
