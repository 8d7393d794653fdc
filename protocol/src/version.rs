//! Protocol identifiers and version management.

use std::fmt;

use crate::ProtocolError;

/// Current protocol version, the last segment of every protocol id.
pub const PROTOCOL_VERSION: &str = "0.0.1";

/// Namespace every link protocol id lives under.
const NAMESPACE: &str = "/link";

/// Peer exchange: the responder writes its known peers' address info.
pub const LINK_PEERS: &str = "/link/peers/0.0.1";
/// Hash announce: the responder writes its pinned content hashes.
pub const LINK_HASH: &str = "/link/hash/0.0.1";
/// Reserved for address lookups; no handler is registered for it yet.
pub const LINK_ADDRESS: &str = "/link/address/0.0.1";

/// A versioned protocol identifier of the form `/link/<name>/<version>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolId(String);

impl ProtocolId {
    /// Build `/link/<name>/<version>`.
    pub fn versioned(name: &str, version: &str) -> Self {
        Self(format!("{NAMESPACE}/{name}/{version}"))
    }

    pub fn peers() -> Self {
        Self(LINK_PEERS.to_string())
    }

    pub fn hash() -> Self {
        Self(LINK_HASH.to_string())
    }

    pub fn address() -> Self {
        Self(LINK_ADDRESS.to_string())
    }

    /// Parse a textual protocol id, rejecting anything outside the link
    /// namespace or with an empty name/version segment.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let rest = raw
            .strip_prefix(NAMESPACE)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| ProtocolError::InvalidProtocolId(raw.to_string()))?;
        match rest.split_once('/') {
            Some((name, version))
                if !name.is_empty() && !version.is_empty() && !version.contains('/') =>
            {
                Ok(Self(raw.to_string()))
            }
            _ => Err(ProtocolError::InvalidProtocolId(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<name>` segment.
    pub fn name(&self) -> &str {
        self.segments().0
    }

    /// The `<version>` segment.
    pub fn version(&self) -> &str {
        self.segments().1
    }

    /// Whether a peer speaking this id can talk to this build.
    pub fn is_compatible(&self) -> bool {
        self.version() == PROTOCOL_VERSION
    }

    fn segments(&self) -> (&str, &str) {
        let rest = &self.0[NAMESPACE.len() + 1..];
        rest.split_once('/').unwrap_or((rest, ""))
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_versioned_builder() {
        assert_eq!(ProtocolId::peers(), ProtocolId::versioned("peers", PROTOCOL_VERSION));
        assert_eq!(ProtocolId::hash(), ProtocolId::versioned("hash", PROTOCOL_VERSION));
        assert_eq!(
            ProtocolId::address(),
            ProtocolId::versioned("address", PROTOCOL_VERSION)
        );
    }

    #[test]
    fn segments_are_exposed() {
        let id = ProtocolId::hash();
        assert_eq!(id.name(), "hash");
        assert_eq!(id.version(), "0.0.1");
        assert!(id.is_compatible());
    }

    #[test]
    fn parse_validates_shape() {
        assert_eq!(ProtocolId::parse(LINK_PEERS).unwrap(), ProtocolId::peers());
        assert!(ProtocolId::parse("/ipfs/id/1.0.0").is_err());
        assert!(ProtocolId::parse("/link/peers").is_err());
        assert!(ProtocolId::parse("/link//0.0.1").is_err());
        assert!(ProtocolId::parse("/link/peers/0.0.1/extra").is_err());
    }

    #[test]
    fn other_versions_are_incompatible() {
        let id = ProtocolId::parse("/link/peers/0.0.2").unwrap();
        assert!(!id.is_compatible());
    }
}
