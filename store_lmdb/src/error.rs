use thiserror::Error;

use link_store::StoreError;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("environment is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(String),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        match e {
            heed::Error::Decoding(inner) | heed::Error::Encoding(inner) => {
                LmdbError::Serialization(inner.to_string())
            }
            other => LmdbError::Heed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for LmdbError {
    fn from(e: std::io::Error) -> Self {
        LmdbError::Io(e.to_string())
    }
}

impl From<LmdbError> for StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(key) => StoreError::NotFound(key),
            LmdbError::Serialization(msg) => StoreError::Serialization(msg),
            LmdbError::Closed => StoreError::StoreClosed,
            other => StoreError::Backend(other.to_string()),
        }
    }
}
