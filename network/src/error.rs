use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("remote address not found: {0}")]
    PeerNotFound(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("cannot register handler for {protocol}: {reason}")]
    HandlerRegistration { protocol: String, reason: String },

    #[error("exchange with {peer} timed out after {after:?}")]
    Timeout { peer: String, after: Duration },

    #[error("invalid peer id: {0}")]
    InvalidPeer(#[from] link_types::TypesError),

    #[error("protocol error: {0}")]
    Protocol(#[from] link_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] link_store::StoreError),
}
