//! Final outcome of a build run.
//!
//! A [`BuildResult`] is created once, when the child process has terminated
//! and both output streams are drained. It is owned by whoever consumed the
//! run and never changes afterwards.

use std::fmt;

use serde::Serialize;

use crate::event::StreamKind;

/// Lifecycle of a build watcher.
///
/// `Idle -> Running -> Completed | Failed`. The two final states are terminal;
/// a new run always starts from a fresh watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
  Idle,
  Running,
  Completed,
  Failed,
}

impl BuildState {
  pub fn is_terminal(self) -> bool {
    matches!(self, BuildState::Completed | BuildState::Failed)
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      BuildState::Idle => "idle",
      BuildState::Running => "running",
      BuildState::Completed => "completed",
      BuildState::Failed => "failed",
    };
    f.write_str(s)
  }
}

/// Why a build did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
  /// The command could not be started (missing executable, permission denied).
  SpawnFailure { message: String },

  /// A single output chunk exceeded the configured ceiling and the process was killed.
  BufferOverflow { stream: StreamKind, limit: usize },

  /// The process ran and exited with a failure status or was killed by a signal.
  NonZeroExit,

  /// An external stop request was honored.
  Cancelled,
}

impl fmt::Display for TerminationReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TerminationReason::SpawnFailure { message } => write!(f, "failed to start: {}", message),
      TerminationReason::BufferOverflow { stream, limit } => {
        write!(f, "{} chunk exceeded the {} byte output limit", stream, limit)
      }
      TerminationReason::NonZeroExit => write!(f, "exited with a failure status"),
      TerminationReason::Cancelled => write!(f, "cancelled"),
    }
  }
}

/// Outcome of one build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
  /// True iff the child exited with status 0 and nothing forced it down.
  pub exit_success: bool,

  /// `None` on success.
  pub termination: Option<TerminationReason>,

  /// The child's exit code, when it exited normally.
  pub exit_code: Option<i32>,

  /// The signal that killed the child (Unix only).
  pub signal: Option<i32>,

  /// Tail of everything the child wrote to stderr, lossily decoded.
  pub captured_stderr: String,
}

impl BuildResult {
  pub(crate) fn success(exit_code: Option<i32>, captured_stderr: String) -> Self {
    Self {
      exit_success: true,
      termination: None,
      exit_code,
      signal: None,
      captured_stderr,
    }
  }

  pub(crate) fn failure(reason: TerminationReason, captured_stderr: String) -> Self {
    Self {
      exit_success: false,
      termination: Some(reason),
      exit_code: None,
      signal: None,
      captured_stderr,
    }
  }

  pub(crate) fn spawn_failure(message: impl Into<String>) -> Self {
    Self::failure(
      TerminationReason::SpawnFailure {
        message: message.into(),
      },
      String::new(),
    )
  }

  /// Reported when an output sequence ends without an exit event.
  pub(crate) fn interrupted() -> Self {
    Self::failure(TerminationReason::Cancelled, String::new())
  }

  pub fn state(&self) -> BuildState {
    if self.exit_success {
      BuildState::Completed
    } else {
      BuildState::Failed
    }
  }

  /// Exit code for a CLI wrapping this build.
  ///
  /// Mirrors the child's own code on a normal exit. Otherwise follows shell
  /// conventions: `128 + signal`, 127 for a command that never started, 130 for
  /// cancellation.
  pub fn exit_code_for_cli(&self) -> i32 {
    match &self.termination {
      None => 0,
      Some(TerminationReason::SpawnFailure { .. }) => 127,
      Some(TerminationReason::Cancelled) => 130,
      Some(TerminationReason::BufferOverflow { .. }) => 1,
      Some(TerminationReason::NonZeroExit) => match (self.exit_code, self.signal) {
        (Some(code), _) if code != 0 => code,
        (_, Some(signal)) => 128 + signal,
        _ => 1,
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn success_is_completed() {
    let result = BuildResult::success(Some(0), String::new());
    assert!(result.exit_success);
    assert_eq!(result.termination, None);
    assert_eq!(result.state(), BuildState::Completed);
    assert_eq!(result.exit_code_for_cli(), 0);
  }

  #[test]
  fn non_zero_exit_mirrors_code() {
    let mut result = BuildResult::failure(TerminationReason::NonZeroExit, "boom".into());
    result.exit_code = Some(3);
    assert_eq!(result.state(), BuildState::Failed);
    assert_eq!(result.exit_code_for_cli(), 3);
  }

  #[test]
  fn signal_death_maps_above_128() {
    let mut result = BuildResult::failure(TerminationReason::NonZeroExit, String::new());
    result.signal = Some(9);
    assert_eq!(result.exit_code_for_cli(), 137);
  }

  #[test]
  fn other_failures_have_fixed_codes() {
    assert_eq!(BuildResult::spawn_failure("not found").exit_code_for_cli(), 127);
    assert_eq!(
      BuildResult::failure(TerminationReason::Cancelled, String::new()).exit_code_for_cli(),
      130
    );
    let overflow = TerminationReason::BufferOverflow {
      stream: StreamKind::Stdout,
      limit: 16,
    };
    assert_eq!(BuildResult::failure(overflow, String::new()).exit_code_for_cli(), 1);
  }

  #[test]
  fn serializes_reason_with_kind_tag() {
    let result = BuildResult::failure(
      TerminationReason::BufferOverflow {
        stream: StreamKind::Stderr,
        limit: 1024,
      },
      String::new(),
    );
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["termination"]["kind"], "buffer_overflow");
    assert_eq!(json["termination"]["stream"], "stderr");
    assert_eq!(json["termination"]["limit"], 1024);
    assert_eq!(json["exit_success"], false);
  }

  #[test]
  fn terminal_states() {
    assert!(!BuildState::Idle.is_terminal());
    assert!(!BuildState::Running.is_terminal());
    assert!(BuildState::Completed.is_terminal());
    assert!(BuildState::Failed.is_terminal());
  }
}
