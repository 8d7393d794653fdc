//! Peer identity, address info, and directory entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Characters permitted in a textual peer id (the base58btc alphabet).
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Upper bound on the textual length of a peer id.
const MAX_PEER_ID_LEN: usize = 128;

/// Opaque identifier of a network participant, as rendered by the transport
/// (base58btc multihash, e.g. `QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Parse and validate a textual peer id.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        if raw.is_empty() || raw.len() > MAX_PEER_ID_LEN {
            return Err(TypesError::InvalidPeerId(raw.to_string()));
        }
        if let Some(bad) = raw.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(TypesError::InvalidPeerId(format!(
                "{raw}: unexpected character {bad:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Return the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes of the textual id, used when deriving storage keys.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PeerId {
    type Error = TypesError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl FromStr for PeerId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A peer identity together with the addresses it can be reached on.
///
/// Serialises to the same JSON shape the transport uses for its address
/// info objects: `{"ID":"Qm…","Addrs":["/ip4/1.2.3.4/tcp/4001"]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddrInfo {
    #[serde(rename = "ID")]
    pub id: PeerId,
    #[serde(rename = "Addrs", default)]
    pub addrs: Vec<String>,
}

impl PeerAddrInfo {
    pub fn new(id: PeerId, addrs: Vec<String>) -> Self {
        Self { id, addrs }
    }
}

impl fmt::Display for PeerAddrInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: [{}]}}", self.id, self.addrs.join(" "))
    }
}

/// Per-peer booleans tracked alongside the address info.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFlags {
    /// The peer serves its channel without restriction.
    #[serde(default)]
    pub free: bool,
    /// This node has joined (subscribed to) the peer's channel.
    #[serde(default)]
    pub join: bool,
    /// Content announced by the peer may be pinned locally.
    #[serde(default)]
    pub pin_eligible: bool,
}

/// One row of the peer directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub info: PeerAddrInfo,
    #[serde(default)]
    pub flags: PeerFlags,
}

impl PeerEntry {
    pub fn new(info: PeerAddrInfo) -> Self {
        Self {
            info,
            flags: PeerFlags::default(),
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.info.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N";

    #[test]
    fn parse_accepts_base58() {
        let id = PeerId::parse(ID).unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn parse_rejects_empty_and_foreign_characters() {
        assert!(PeerId::parse("").is_err());
        // '0', 'O', 'I' and 'l' are not in the base58 alphabet.
        assert!(PeerId::parse("Qm0abc").is_err());
        assert!(PeerId::parse("/link/Qmabc").is_err());
        assert!(PeerId::parse(&"a".repeat(MAX_PEER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn addr_info_uses_transport_json_shape() {
        let info = PeerAddrInfo::new(
            PeerId::parse(ID).unwrap(),
            vec!["/ip4/10.0.0.1/tcp/4001".to_string()],
        );
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(
            json,
            format!(r#"{{"ID":"{ID}","Addrs":["/ip4/10.0.0.1/tcp/4001"]}}"#)
        );
    }

    #[test]
    fn addr_info_without_addrs_decodes_empty() {
        let info: PeerAddrInfo = serde_json::from_str(&format!(r#"{{"ID":"{ID}"}}"#)).unwrap();
        assert!(info.addrs.is_empty());
    }

    #[test]
    fn decoding_validates_peer_id() {
        let result: Result<PeerAddrInfo, _> = serde_json::from_str(r#"{"ID":"not valid!"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn entry_defaults_flags_when_absent() {
        let json = format!(r#"{{"info":{{"ID":"{ID}","Addrs":[]}}}}"#);
        let entry: PeerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry.flags, PeerFlags::default());
    }
}
