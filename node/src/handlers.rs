//! Responders for the two link protocols.
//!
//! A session writes a snapshot as newline-terminated records and then
//! closes the stream, whatever happened in between. Handlers take their
//! snapshot once, up front, and never touch shared state afterwards.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::io::AsyncWriteExt;

use link_network::{BoxedStream, PeerDirectory, StreamHandler};
use link_protocol::{encode_hash, encode_peer, write_record, ProtocolError, LINK_HASH, LINK_PEERS};

use crate::pinning::PinningTracker;
use crate::shutdown::ShutdownSignal;

/// Upper bound on closing a stream once the session has ended.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session limits shared by every handler invocation.
#[derive(Clone)]
pub struct HandlerContext {
    /// Deadline for writing the whole session.
    pub timeout: Duration,
    pub shutdown: ShutdownSignal,
}

/// How a session ended. Each variant carries the number of records fully
/// written before the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed(usize),
    /// A write failed.
    Aborted(usize),
    TimedOut(usize),
    /// The service began shutting down.
    Cancelled(usize),
}

impl SessionOutcome {
    pub fn written(&self) -> usize {
        match *self {
            Self::Completed(n) | Self::Aborted(n) | Self::TimedOut(n) | Self::Cancelled(n) => n,
        }
    }
}

/// Write the address info of every directory entry.
pub async fn serve_peer_exchange(
    stream: BoxedStream,
    directory: &PeerDirectory,
    ctx: &HandlerContext,
) -> SessionOutcome {
    let snapshot = directory.snapshot();
    let payloads = snapshot.iter().map(|entry| encode_peer(&entry.info));
    run_session(stream, LINK_PEERS, payloads, ctx).await
}

/// Write every hash of the current pin snapshot.
pub async fn serve_hash_announce(
    stream: BoxedStream,
    tracker: &PinningTracker,
    ctx: &HandlerContext,
) -> SessionOutcome {
    let snapshot = tracker.get();
    let payloads = snapshot.iter().map(|hash| encode_hash(hash));
    run_session(stream, LINK_HASH, payloads, ctx).await
}

pub fn peer_exchange_handler(directory: Arc<PeerDirectory>, ctx: HandlerContext) -> StreamHandler {
    Arc::new(move |stream: BoxedStream| {
        let directory = Arc::clone(&directory);
        let ctx = ctx.clone();
        async move {
            serve_peer_exchange(stream, &directory, &ctx).await;
        }
        .boxed()
    })
}

pub fn hash_announce_handler(tracker: Arc<PinningTracker>, ctx: HandlerContext) -> StreamHandler {
    Arc::new(move |stream: BoxedStream| {
        let tracker = Arc::clone(&tracker);
        let ctx = ctx.clone();
        async move {
            serve_hash_announce(stream, &tracker, &ctx).await;
        }
        .boxed()
    })
}

enum Ended {
    Done,
    Failed(ProtocolError),
    TimedOut,
    Cancelled,
}

async fn run_session<I>(
    mut stream: BoxedStream,
    protocol: &'static str,
    payloads: I,
    ctx: &HandlerContext,
) -> SessionOutcome
where
    I: Iterator<Item = Result<Vec<u8>, ProtocolError>> + Send,
{
    let peer = stream.remote_peer().clone();
    let mut shutdown = ctx.shutdown.clone();
    let mut written = 0usize;

    let ended = tokio::select! {
        biased;
        _ = shutdown.wait() => Ended::Cancelled,
        result = tokio::time::timeout(ctx.timeout, write_all(&mut stream, payloads, &mut written)) => {
            match result {
                Ok(Ok(())) => Ended::Done,
                Ok(Err(e)) => Ended::Failed(e),
                Err(_) => Ended::TimedOut,
            }
        }
    };

    let outcome = match ended {
        Ended::Done => SessionOutcome::Completed(written),
        Ended::Failed(e) => {
            tracing::warn!(%peer, protocol, written, error = %e, "stream write failed, aborting session");
            SessionOutcome::Aborted(written)
        }
        Ended::TimedOut => {
            tracing::warn!(%peer, protocol, written, timeout = ?ctx.timeout, "session timed out");
            SessionOutcome::TimedOut(written)
        }
        Ended::Cancelled => {
            tracing::debug!(%peer, protocol, written, "session cancelled by shutdown");
            SessionOutcome::Cancelled(written)
        }
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, stream.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(%peer, protocol, error = %e, "stream close failed"),
        Err(_) => tracing::debug!(%peer, protocol, "stream close timed out"),
    }
    tracing::trace!(%peer, protocol, ?outcome, "session closed");
    outcome
}

async fn write_all<I>(
    stream: &mut BoxedStream,
    payloads: I,
    written: &mut usize,
) -> Result<(), ProtocolError>
where
    I: Iterator<Item = Result<Vec<u8>, ProtocolError>>,
{
    for payload in payloads {
        write_record(stream, &payload?).await?;
        *written += 1;
    }
    stream.flush().await?;
    Ok(())
}
