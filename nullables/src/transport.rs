//! Nullable transport: an in-process [`Transport`] with scripted remotes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

use link_network::{BoxedStream, LinkStream, NetworkError, StreamHandler, Transport};
use link_protocol::ProtocolId;
use link_types::{PeerAddrInfo, PeerId};

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// What a scripted remote does when the local node opens a stream to it.
#[derive(Clone)]
enum Remote {
    /// Write these bytes, then close.
    Respond(Vec<u8>),
    /// Accept the stream and never write or close.
    Hang,
}

#[derive(Default)]
struct State {
    handlers: HashMap<ProtocolId, StreamHandler>,
    rejected: HashSet<ProtocolId>,
    connected: BTreeMap<PeerId, PeerAddrInfo>,
    remotes: HashMap<(PeerId, ProtocolId), Remote>,
    connect_log: Vec<PeerId>,
    refuse_connect: bool,
}

/// An in-memory transport for tests.
///
/// Inbound streams are simulated with [`NullTransport::dispatch`], which
/// hands one end of a duplex pipe to the registered handler and returns the
/// other end. Outbound streams reach scripted remotes set up with
/// [`NullTransport::respond`] / [`NullTransport::hang`].
pub struct NullTransport {
    local: PeerId,
    state: Mutex<State>,
}

impl NullTransport {
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            state: Mutex::new(State::default()),
        }
    }

    /// Mark `info` as connected, as if the transport had dialled it.
    pub fn add_connected(&self, info: PeerAddrInfo) {
        self.state.lock().connected.insert(info.id.clone(), info);
    }

    pub fn disconnect(&self, peer: &PeerId) {
        self.state.lock().connected.remove(peer);
    }

    /// `peer` answers streams under `protocol` with `bytes` and closes.
    pub fn respond(&self, peer: &PeerId, protocol: &ProtocolId, bytes: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .remotes
            .insert((peer.clone(), protocol.clone()), Remote::Respond(bytes.into()));
    }

    /// `peer` accepts streams under `protocol` but never answers.
    pub fn hang(&self, peer: &PeerId, protocol: &ProtocolId) {
        self.state
            .lock()
            .remotes
            .insert((peer.clone(), protocol.clone()), Remote::Hang);
    }

    /// Make later [`Transport::set_stream_handler`] calls for `protocol` fail.
    pub fn reject_handler(&self, protocol: &ProtocolId) {
        self.state.lock().rejected.insert(protocol.clone());
    }

    /// Make later [`Transport::connect`] calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connect = refuse;
    }

    pub fn has_handler(&self, protocol: &ProtocolId) -> bool {
        self.state.lock().handlers.contains_key(protocol)
    }

    pub fn handler_count(&self) -> usize {
        self.state.lock().handlers.len()
    }

    /// Peers passed to [`Transport::connect`], in call order.
    pub fn connect_log(&self) -> Vec<PeerId> {
        self.state.lock().connect_log.clone()
    }

    /// Simulate `remote` opening a stream under `protocol`.
    ///
    /// Spawns the registered handler on the other end of a duplex pipe and
    /// returns the remote's end, or `None` if nothing is registered.
    pub fn dispatch(&self, protocol: &ProtocolId, remote: PeerId) -> Option<DuplexStream> {
        let handler = self.state.lock().handlers.get(protocol).cloned()?;
        let (local_end, remote_end) = tokio::io::duplex(DUPLEX_CAPACITY);
        let stream: BoxedStream = Box::new(PipeStream {
            peer: remote,
            io: local_end,
        });
        tokio::spawn(handler(stream));
        Some(remote_end)
    }
}

#[async_trait]
impl Transport for NullTransport {
    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn set_stream_handler(
        &self,
        protocol: &ProtocolId,
        handler: StreamHandler,
    ) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        if state.rejected.contains(protocol) {
            return Err(NetworkError::HandlerRegistration {
                protocol: protocol.to_string(),
                reason: "rejected by null transport".into(),
            });
        }
        state.handlers.insert(protocol.clone(), handler);
        Ok(())
    }

    fn remove_stream_handler(&self, protocol: &ProtocolId) {
        self.state.lock().handlers.remove(protocol);
    }

    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: &ProtocolId,
    ) -> Result<BoxedStream, NetworkError> {
        let remote = self
            .state
            .lock()
            .remotes
            .get(&(peer.clone(), protocol.clone()))
            .cloned()
            .ok_or_else(|| {
                NetworkError::ConnectionFailed(format!("{peer} does not speak {protocol}"))
            })?;

        let (local_end, mut remote_end) = tokio::io::duplex(DUPLEX_CAPACITY);
        match remote {
            Remote::Respond(bytes) => {
                tokio::spawn(async move {
                    // Fails only when the local side hung up early.
                    let _ = remote_end.write_all(&bytes).await;
                    let _ = remote_end.shutdown().await;
                });
            }
            Remote::Hang => {
                tokio::spawn(async move {
                    let _held = remote_end;
                    std::future::pending::<()>().await;
                });
            }
        }
        Ok(Box::new(PipeStream {
            peer: peer.clone(),
            io: local_end,
        }))
    }

    async fn connect(&self, info: &PeerAddrInfo) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        state.connect_log.push(info.id.clone());
        if state.refuse_connect {
            return Err(NetworkError::ConnectionFailed(format!(
                "{} refused by null transport",
                info.id
            )));
        }
        state.connected.insert(info.id.clone(), info.clone());
        Ok(())
    }

    fn connected_peers(&self) -> Vec<PeerAddrInfo> {
        self.state.lock().connected.values().cloned().collect()
    }
}

/// One end of an in-process pipe, tagged with the peer on the other end.
struct PipeStream {
    peer: PeerId,
    io: DuplexStream,
}

impl LinkStream for PipeStream {
    fn remote_peer(&self) -> &PeerId {
        &self.peer
    }
}

impl AsyncRead for PipeStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn peer(id: &str) -> PeerId {
        PeerId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn scripted_remote_answers_and_closes() {
        let transport = NullTransport::new(peer("QmHome"));
        transport.respond(&peer("QmRemote"), &ProtocolId::hash(), b"QmA\n".to_vec());

        let mut stream = transport
            .open_stream(&peer("QmRemote"), &ProtocolId::hash())
            .await
            .unwrap();
        assert_eq!(stream.remote_peer(), &peer("QmRemote"));
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"QmA\n".to_vec());
    }

    #[tokio::test]
    async fn unknown_remote_fails_to_open() {
        let transport = NullTransport::new(peer("QmHome"));
        let result = transport.open_stream(&peer("QmRemote"), &ProtocolId::peers()).await;
        assert!(matches!(result, Err(NetworkError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn dispatch_runs_registered_handler() {
        let transport = NullTransport::new(peer("QmHome"));
        let handler: StreamHandler = Arc::new(|mut stream: BoxedStream| {
            async move {
                let greeting = format!("hi {}\n", stream.remote_peer());
                let _ = stream.write_all(greeting.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            .boxed()
        });
        transport.set_stream_handler(&ProtocolId::peers(), handler).unwrap();
        assert!(transport.dispatch(&ProtocolId::hash(), peer("QmRemote")).is_none());

        let mut remote = transport
            .dispatch(&ProtocolId::peers(), peer("QmRemote"))
            .unwrap();
        let mut out = String::new();
        remote.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hi QmRemote\n");
    }

    #[tokio::test]
    async fn connect_is_logged_even_when_refused() {
        let transport = NullTransport::new(peer("QmHome"));
        let info = PeerAddrInfo::new(peer("QmRemote"), vec![]);
        transport.refuse_connections(true);
        assert!(transport.connect(&info).await.is_err());
        transport.refuse_connections(false);
        transport.connect(&info).await.unwrap();
        assert_eq!(transport.connect_log().len(), 2);
        assert_eq!(transport.connected_peers(), vec![info]);
    }
}
