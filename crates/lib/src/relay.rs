//! Console relay.
//!
//! Forwards a build's output events to a pair of writers, normally the
//! caller's stdout and stderr, flushing after every chunk so the console
//! follows the build as it happens. Stderr is always surfaced, including on
//! successful builds that only emit warnings.

use std::collections::VecDeque;
use std::future::Future;
use std::io::Write;

use tracing::{debug, warn};

use crate::event::{OutputEvent, StreamKind};
use crate::result::BuildResult;
use crate::watcher::BuildRun;

/// A source of build output events.
pub trait EventSource {
  /// Next event, or `None` when the sequence is exhausted.
  fn next_event(&mut self) -> impl Future<Output = Option<OutputEvent>>;
}

impl EventSource for BuildRun {
  fn next_event(&mut self) -> impl Future<Output = Option<OutputEvent>> {
    BuildRun::next_event(self)
  }
}

/// A fixed, pre-recorded event sequence.
#[derive(Debug, Default, Clone)]
pub struct ScriptedEvents {
  events: VecDeque<OutputEvent>,
}

impl ScriptedEvents {
  pub fn new(events: impl IntoIterator<Item = OutputEvent>) -> Self {
    Self {
      events: events.into_iter().collect(),
    }
  }
}

impl EventSource for ScriptedEvents {
  fn next_event(&mut self) -> impl Future<Output = Option<OutputEvent>> {
    std::future::ready(self.events.pop_front())
  }
}

/// Relay every chunk from `source` to the matching writer and return the result.
///
/// Console write failures are logged and otherwise ignored; a closed terminal
/// must not take the build down with it.
pub async fn relay<S, O, E>(source: &mut S, stdout: &mut O, stderr: &mut E) -> BuildResult
where
  S: EventSource,
  O: Write,
  E: Write,
{
  while let Some(event) = source.next_event().await {
    match event {
      OutputEvent::Stdout(bytes) => write_chunk(stdout, &bytes, StreamKind::Stdout),
      OutputEvent::Stderr(bytes) => write_chunk(stderr, &bytes, StreamKind::Stderr),
      OutputEvent::Exit(result) => {
        debug!(success = result.exit_success, "relay finished");
        return result;
      }
    }
  }

  warn!("output ended without an exit event");
  BuildResult::interrupted()
}

fn write_chunk<W: Write>(writer: &mut W, bytes: &[u8], stream: StreamKind) {
  if let Err(e) = writer.write_all(bytes).and_then(|_| writer.flush()) {
    warn!(%stream, error = %e, "failed to relay build output");
  }
}

#[cfg(test)]
mod tests {
  use std::io;

  use super::*;
  use crate::result::TerminationReason;

  fn ok() -> BuildResult {
    BuildResult::success(Some(0), String::new())
  }

  #[tokio::test]
  async fn relays_chunks_in_order() {
    let mut source = ScriptedEvents::new([
      OutputEvent::Stdout(b"A".to_vec()),
      OutputEvent::Stdout(b"B".to_vec()),
      OutputEvent::Stdout(b"C".to_vec()),
      OutputEvent::Exit(ok()),
    ]);
    let mut out = Vec::new();
    let mut err = Vec::new();

    let result = relay(&mut source, &mut out, &mut err).await;

    assert!(result.exit_success);
    assert_eq!(out, b"ABC");
    assert!(err.is_empty());
  }

  #[tokio::test]
  async fn stderr_goes_to_stderr_writer() {
    let mut source = ScriptedEvents::new([
      OutputEvent::Stdout(b"compiled\n".to_vec()),
      OutputEvent::Stderr(b"warning: bundle size\n".to_vec()),
      OutputEvent::Stdout(b"done\n".to_vec()),
      OutputEvent::Exit(ok()),
    ]);
    let mut out = Vec::new();
    let mut err = Vec::new();

    relay(&mut source, &mut out, &mut err).await;

    assert_eq!(out, b"compiled\ndone\n");
    assert_eq!(err, b"warning: bundle size\n");
  }

  #[tokio::test]
  async fn stops_at_exit() {
    let failed = BuildResult::failure(TerminationReason::NonZeroExit, "boom\n".into());
    let mut source = ScriptedEvents::new([
      OutputEvent::Exit(failed.clone()),
      OutputEvent::Stdout(b"never".to_vec()),
    ]);
    let mut out = Vec::new();

    let result = relay(&mut source, &mut out, &mut io::sink()).await;

    assert_eq!(result, failed);
    assert!(out.is_empty());
  }

  #[tokio::test]
  async fn missing_exit_is_reported() {
    let mut source = ScriptedEvents::new([OutputEvent::Stdout(b"partial".to_vec())]);

    let result = relay(&mut source, &mut io::sink(), &mut io::sink()).await;

    assert!(!result.exit_success);
    assert_eq!(result.termination, Some(TerminationReason::Cancelled));
  }

  struct BrokenPipe;

  impl Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
      Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  #[tokio::test]
  async fn write_errors_do_not_stop_relay() {
    let mut source = ScriptedEvents::new([
      OutputEvent::Stdout(b"lost".to_vec()),
      OutputEvent::Stderr(b"kept".to_vec()),
      OutputEvent::Exit(ok()),
    ]);
    let mut err = Vec::new();

    let result = relay(&mut source, &mut BrokenPipe, &mut err).await;

    assert!(result.exit_success);
    assert_eq!(err, b"kept");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn relays_real_build() {
    use crate::invocation::BuildInvocation;
    use crate::watcher::run;

    let mut build = run(BuildInvocation::new("echo", ["hello"]).unwrap());
    let mut out = Vec::new();

    let result = relay(&mut build, &mut out, &mut io::sink()).await;

    assert!(result.exit_success);
    assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
  }
}
