//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the link subsystem (record storage, the
//! peer-to-peer transport, the streams it hands out) sits behind a trait.
//! This crate provides test-friendly implementations that:
//! - Never touch the filesystem or the network
//! - Can be steered programmatically (scripted remotes, injected failures)
//! - Record what was done to them for assertions
//!
//! Usage: swap real implementations for nullables in tests.

pub mod store;
pub mod stream;
pub mod transport;

pub use store::NullStore;
pub use stream::{NullStream, StreamRecorder};
pub use transport::NullTransport;
