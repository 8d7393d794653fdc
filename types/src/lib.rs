//! Fundamental types for the link subsystem.
//!
//! Peer identities, the address info exchanged over `/link/peers`, and the
//! per-peer flags held by the peer directory.

pub mod error;
pub mod peer;

pub use error::TypesError;
pub use peer::{PeerAddrInfo, PeerEntry, PeerFlags, PeerId};
