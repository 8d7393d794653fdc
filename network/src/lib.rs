//! Networking layer for the link subsystem.
//!
//! The peer-to-peer transport itself is external; this crate defines the
//! narrow [`Transport`] seam it is consumed through, the concurrent
//! [`PeerDirectory`] of known peers, and the [`ExchangeClient`] that drives
//! the consuming side of the link protocols.

pub mod error;
pub mod exchange;
pub mod peer_directory;
pub mod transport;

pub use error::NetworkError;
pub use exchange::ExchangeClient;
pub use peer_directory::{FailureOutcome, PeerDirectory};
pub use transport::{BoxedStream, LinkStream, StreamHandler, Transport};
