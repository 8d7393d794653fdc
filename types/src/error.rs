use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),
}
