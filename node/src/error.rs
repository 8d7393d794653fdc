use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] link_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] link_store_lmdb::LmdbError),

    #[error("network error: {0}")]
    Network(#[from] link_network::NetworkError),

    #[error("protocol error: {0}")]
    Protocol(#[from] link_protocol::ProtocolError),

    #[error("invalid peer id: {0}")]
    InvalidPeer(#[from] link_types::TypesError),

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
