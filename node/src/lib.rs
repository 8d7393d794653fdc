//! Link service: peer-state sync and persistent caching on top of a
//! peer-to-peer transport.
//!
//! The service:
//! - Serves `/link/peers` (known peer addresses) and `/link/hash` (pinned
//!   content hashes) to any peer that opens a stream
//! - Keeps the peer directory fed from the transport's connected peers and
//!   from peer exchanges, evicting peers that keep failing
//! - Republishes the pin snapshot on a fixed interval
//! - Backs up directory and pin snapshot to LMDB and restores them at start

pub mod config;
pub mod content;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod pinning;
pub mod service;
pub mod shutdown;
pub mod subscription;

pub use config::{BackupConfig, DiscoveryConfig, LinkConfig, PinningConfig, CONFIG_FILE};
pub use content::ContentCache;
pub use error::NodeError;
pub use handlers::{
    hash_announce_handler, peer_exchange_handler, serve_hash_announce, serve_peer_exchange,
    HandlerContext, SessionOutcome,
};
pub use logging::{init_logging, LogFormat};
pub use pinning::{PinSnapshot, PinSource, PinningTracker};
pub use service::{LinkService, RunningService, ServiceContext, StoreSet};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use subscription::Subscriber;
