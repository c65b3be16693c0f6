//! Events produced by a running build.

use std::fmt;

use serde::Serialize;

use crate::result::BuildResult;

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
  Stdout,
  Stderr,
}

impl fmt::Display for StreamKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StreamKind::Stdout => write!(f, "stdout"),
      StreamKind::Stderr => write!(f, "stderr"),
    }
  }
}

/// One item of a build's output sequence.
///
/// Chunks of the same stream arrive in the order the child wrote them.
/// `Exit` is always the final event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
  Stdout(Vec<u8>),
  Stderr(Vec<u8>),
  Exit(BuildResult),
}

impl OutputEvent {
  pub(crate) fn chunk(stream: StreamKind, bytes: Vec<u8>) -> Self {
    match stream {
      StreamKind::Stdout => OutputEvent::Stdout(bytes),
      StreamKind::Stderr => OutputEvent::Stderr(bytes),
    }
  }

  /// The stream this event belongs to, or `None` for `Exit`.
  pub fn stream(&self) -> Option<StreamKind> {
    match self {
      OutputEvent::Stdout(_) => Some(StreamKind::Stdout),
      OutputEvent::Stderr(_) => Some(StreamKind::Stderr),
      OutputEvent::Exit(_) => None,
    }
  }

  pub fn is_exit(&self) -> bool {
    matches!(self, OutputEvent::Exit(_))
  }
}
