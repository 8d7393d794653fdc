//! Storage key derivation.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

use link_types::PeerId;

/// Namespace prefix shared by every link-owned key.
pub const LINK_PREFIX: &str = "/link/";

/// Key under which the last published pin snapshot is kept.
pub const PIN_SNAPSHOT_KEY: &str = "/link/pins/snapshot";

/// Storage key for a peer: `/link/` followed by the unpadded standard
/// base64 encoding of the peer id bytes.
pub fn link_key(id: &PeerId) -> String {
    format!("{LINK_PREFIX}{}", STANDARD_NO_PAD.encode(id.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_key_is_prefixed_unpadded_base64() {
        let id = PeerId::parse("QmPeer1").unwrap();
        // "QmPeer1" is 7 bytes; padded base64 would end in '='.
        assert_eq!(link_key(&id), "/link/UW1QZWVyMQ");
    }

    #[test]
    fn distinct_peers_get_distinct_keys() {
        let a = PeerId::parse("QmPeerA").unwrap();
        let b = PeerId::parse("QmPeerB").unwrap();
        assert_ne!(link_key(&a), link_key(&b));
    }
}
