//! Wire protocol: protocol identifiers, versioning, and record framing.
//!
//! Both link protocols write newline-delimited records over a bidirectional
//! stream and close it when done. `/link/peers` records are JSON address
//! info objects; `/link/hash` records are raw hash strings.

pub mod codec;
pub mod error;
pub mod version;

pub use codec::{
    decode_hash, decode_peer, encode_hash, encode_peer, read_record, read_records, write_record,
    LINE_TERMINATOR, MAX_RECORDS, MAX_RECORD_SIZE,
};
pub use error::ProtocolError;
pub use version::{ProtocolId, LINK_ADDRESS, LINK_HASH, LINK_PEERS, PROTOCOL_VERSION};
