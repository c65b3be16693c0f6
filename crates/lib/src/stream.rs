//! Child stream readers.
//!
//! Each child stream gets one reader task. The reader cuts the byte stream
//! into chunks at line or carriage-return boundaries and forwards every chunk
//! as soon as it is complete, so the only data held in memory is the chunk
//! currently being assembled. That chunk is what the buffer ceiling bounds.
//! Forwarded chunks wait in a bounded queue, so a slow consumer throttles
//! the child rather than growing memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::consts::{READ_CAPACITY, STREAM_DRAIN_TIMEOUT};
use crate::event::{OutputEvent, StreamKind};

/// Outcome of feeding bytes into a [`Chunker`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Feed {
  /// Input absorbed, chunk still incomplete.
  Pending,
  /// A chunk is complete.
  Chunk(Vec<u8>),
  /// The pending chunk grew beyond the limit.
  Overflow,
}

/// Splits a byte stream into chunks ending at `\n` or `\r`.
#[derive(Debug)]
pub(crate) struct Chunker {
  pending: Vec<u8>,
  limit: usize,
}

impl Chunker {
  pub(crate) fn new(limit: usize) -> Self {
    Self {
      pending: Vec::new(),
      limit,
    }
  }

  /// Absorb bytes up to and including the first chunk boundary in `input`.
  ///
  /// Returns how many bytes of `input` were consumed.
  pub(crate) fn feed(&mut self, input: &[u8]) -> (usize, Feed) {
    let consumed = match input.iter().position(|b| *b == b'\n' || *b == b'\r') {
      Some(idx) => idx + 1,
      None => input.len(),
    };
    self.pending.extend_from_slice(&input[..consumed]);

    if self.pending.len() > self.limit {
      self.pending.clear();
      return (consumed, Feed::Overflow);
    }

    let at_boundary = matches!(self.pending.last(), Some(b'\n' | b'\r'));
    if at_boundary {
      (consumed, Feed::Chunk(std::mem::take(&mut self.pending)))
    } else {
      (consumed, Feed::Pending)
    }
  }

  /// Flush whatever is left once the stream has closed.
  pub(crate) fn finish(&mut self) -> Option<Vec<u8>> {
    if self.pending.is_empty() {
      None
    } else {
      Some(std::mem::take(&mut self.pending))
    }
  }
}

/// Tail of a child's stderr, capped at a byte limit.
#[derive(Debug)]
pub(crate) struct StderrCapture {
  buf: VecDeque<u8>,
  limit: usize,
}

impl StderrCapture {
  pub(crate) fn new(limit: usize) -> Self {
    Self {
      buf: VecDeque::new(),
      limit,
    }
  }

  pub(crate) fn append(&mut self, bytes: &[u8]) {
    if bytes.len() >= self.limit {
      self.buf.clear();
      self.buf.extend(&bytes[bytes.len() - self.limit..]);
      return;
    }
    let excess = (self.buf.len() + bytes.len()).saturating_sub(self.limit);
    self.buf.drain(..excess);
    self.buf.extend(bytes);
  }

  pub(crate) fn to_string_lossy(&self) -> String {
    let (head, tail) = self.buf.as_slices();
    let mut bytes = Vec::with_capacity(self.buf.len());
    bytes.extend_from_slice(head);
    bytes.extend_from_slice(tail);
    String::from_utf8_lossy(&bytes).into_owned()
  }
}

pub(crate) type SharedCapture = Arc<Mutex<StderrCapture>>;

/// Read one child stream to EOF, forwarding chunks as events.
///
/// Forwarding waits for room in `events`, so a consumer that falls behind
/// stops the reader and the child blocks on its full pipe instead of output
/// piling up in memory.
///
/// On overflow the reader reports the stream on `overflow` and stops reading,
/// leaving the supervisor to bring the child down. When `capture` is set,
/// every chunk is also appended to it; this reader is its only writer.
///
/// Once `exited` turns true the reader may spend at most
/// [`STREAM_DRAIN_TIMEOUT`] waiting for more output. Returns false if it gave
/// up on a stream still held open, true if the stream closed.
pub(crate) async fn pump<R>(
  reader: R,
  stream: StreamKind,
  limit: usize,
  events: mpsc::Sender<OutputEvent>,
  overflow: mpsc::Sender<StreamKind>,
  capture: Option<SharedCapture>,
  mut exited: watch::Receiver<bool>,
) -> bool
where
  R: AsyncRead + Unpin,
{
  let mut reader = BufReader::with_capacity(READ_CAPACITY, reader);
  let mut chunker = Chunker::new(limit);
  let mut drain_budget = STREAM_DRAIN_TIMEOUT;

  loop {
    let after_exit = *exited.borrow();
    let waiting_since = Instant::now();
    let read = tokio::select! {
      read = reader.fill_buf() => read,
      _ = drain_deadline(&mut exited, drain_budget) => {
        warn!(%stream, "build output still open after exit, abandoning stream");
        return false;
      }
    };
    if after_exit {
      drain_budget = drain_budget.saturating_sub(waiting_since.elapsed());
    }

    let available = match read {
      Ok(buf) => buf,
      Err(e) => {
        debug!(%stream, error = %e, "read failed, closing stream");
        break;
      }
    };
    if available.is_empty() {
      break;
    }

    let (consumed, outcome) = chunker.feed(available);
    reader.consume(consumed);

    match outcome {
      Feed::Pending => {}
      Feed::Chunk(bytes) => emit(stream, bytes, &events, capture.as_ref()).await,
      Feed::Overflow => {
        warn!(%stream, limit, "output chunk exceeded buffer limit");
        let _ = overflow.send(stream).await;
        return true;
      }
    }
  }

  if let Some(rest) = chunker.finish() {
    emit(stream, rest, &events, capture.as_ref()).await;
  }
  debug!(%stream, "stream closed");
  true
}

/// Resolves `budget` after the child has exited; never before.
async fn drain_deadline(exited: &mut watch::Receiver<bool>, budget: Duration) {
  if exited.wait_for(|exited| *exited).await.is_err() {
    std::future::pending::<()>().await;
  }
  tokio::time::sleep(budget).await;
}

async fn emit(
  stream: StreamKind,
  bytes: Vec<u8>,
  events: &mpsc::Sender<OutputEvent>,
  capture: Option<&SharedCapture>,
) {
  if let Some(capture) = capture {
    if let Ok(mut capture) = capture.lock() {
      capture.append(&bytes);
    }
  }
  // A closed receiver fails at once; keep reading so the child never blocks on a full pipe.
  let _ = events.send(OutputEvent::chunk(stream, bytes)).await;
}
