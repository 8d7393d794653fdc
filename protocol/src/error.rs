use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid protocol id: {0}")]
    InvalidProtocolId(String),

    #[error("record too large: {size} > {max}")]
    RecordTooLarge { size: usize, max: usize },

    #[error("too many records: more than {max}")]
    TooManyRecords { max: usize },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("stream IO error: {0}")]
    StreamIo(#[from] std::io::Error),
}
