//! Nullable stream: an in-memory [`LinkStream`] that records writes.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use link_network::LinkStream;
use link_types::PeerId;

#[derive(Default)]
struct StreamState {
    input: Vec<u8>,
    read_pos: usize,
    written: Vec<u8>,
    write_calls: usize,
    fail_after: Option<usize>,
    stall: bool,
    closed: bool,
}

/// A stream whose readable side is a fixed buffer and whose writable side
/// appends to an inspectable log. Write failures and stalls can be injected.
pub struct NullStream {
    peer: PeerId,
    state: Arc<Mutex<StreamState>>,
}

/// Inspection handle that outlives the boxed stream.
#[derive(Clone)]
pub struct StreamRecorder {
    state: Arc<Mutex<StreamState>>,
}

impl NullStream {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            state: Arc::new(Mutex::new(StreamState::default())),
        }
    }

    /// Bytes the local side will read before end of stream.
    pub fn with_input(self, input: impl Into<Vec<u8>>) -> Self {
        self.state.lock().input = input.into();
        self
    }

    /// Accept `n` write calls, then fail every later one with `BrokenPipe`.
    pub fn fail_after_writes(self, n: usize) -> Self {
        self.state.lock().fail_after = Some(n);
        self
    }

    /// Never complete a write.
    pub fn stall_writes(self) -> Self {
        self.state.lock().stall = true;
        self
    }

    pub fn recorder(&self) -> StreamRecorder {
        StreamRecorder {
            state: Arc::clone(&self.state),
        }
    }
}

impl StreamRecorder {
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Complete newline-terminated records written so far.
    pub fn records(&self) -> Vec<String> {
        let written = self.written();
        let mut records: Vec<String> = written
            .split(|b| *b == b'\n')
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect();
        // The fragment after the last terminator is not a record.
        records.pop();
        records
    }

    /// Number of successful write calls.
    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl LinkStream for NullStream {
    fn remote_peer(&self) -> &PeerId {
        &self.peer
    }
}

impl AsyncRead for NullStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.state.lock();
        let start = state.read_pos;
        let n = buf.remaining().min(state.input.len() - start);
        buf.put_slice(&state.input[start..start + n]);
        state.read_pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for NullStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock();
        if state.closed {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed")));
        }
        if state.stall {
            return Poll::Pending;
        }
        if state.fail_after.is_some_and(|n| state.write_calls >= n) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        state.written.extend_from_slice(buf);
        state.write_calls += 1;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.lock().closed = true;
        Poll::Ready(Ok(()))
    }
}
