//! Build watcher.
//!
//! Runs one external build command (possibly a never-ending watch mode) and
//! exposes its output as a sequence of [`OutputEvent`]s ending in
//! [`OutputEvent::Exit`]. Output is streamed chunk by chunk; the buffer limit
//! only bounds a single chunk, so a chatty build is never killed for volume.
//!
//! Every run is supervised by one task that waits for whichever comes first:
//! - the child exiting on its own
//! - a reader reporting an oversized chunk
//! - a cancellation request
//!
//! In the last two cases the child is asked to terminate, then killed after
//! the invocation's grace period.
//!
//! Events travel through a bounded queue. A consumer that stops reading
//! stalls the stream readers, and with them the child on its full pipes.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::consts::EVENT_CHANNEL_CAPACITY;
use crate::event::{OutputEvent, StreamKind};
use crate::invocation::BuildInvocation;
use crate::result::{BuildResult, BuildState, TerminationReason};
use crate::stream::{SharedCapture, StderrCapture, pump};

/// Run `invocation` on a fresh watcher.
///
/// Must be called from within a tokio runtime.
pub fn run(invocation: BuildInvocation) -> BuildRun {
  BuildWatcher::new(invocation).start()
}

/// A build that has not been started yet.
#[derive(Debug)]
pub struct BuildWatcher {
  invocation: BuildInvocation,
}

impl BuildWatcher {
  pub fn new(invocation: BuildInvocation) -> Self {
    Self { invocation }
  }

  pub fn invocation(&self) -> &BuildInvocation {
    &self.invocation
  }

  /// An unstarted watcher is always idle.
  pub fn state(&self) -> BuildState {
    BuildState::Idle
  }

  /// Spawn the build command and start relaying its output.
  ///
  /// A command that cannot be spawned does not fail here: the returned run
  /// yields a single `Exit` event carrying [`TerminationReason::SpawnFailure`].
  pub fn start(self) -> BuildRun {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(BuildState::Running);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel = CancelHandle {
      tx: Arc::new(cancel_tx),
    };

    let cmd = self.invocation.display_command();
    info!(cmd = %cmd, cwd = ?self.invocation.working_directory(), "starting build");

    let mut command = build_command(&self.invocation);
    let pid = match command.spawn() {
      Ok(child) => {
        let pid = child.id();
        debug!(pid = ?pid, "build process spawned");
        tokio::spawn(supervise(child, self.invocation, event_tx, state_tx, cancel_rx));
        pid
      }
      Err(e) => {
        warn!(cmd = %cmd, error = %e, "failed to spawn build command");
        let result = BuildResult::spawn_failure(format!("{}: {}", self.invocation.command(), e));
        state_tx.send_replace(result.state());
        // The queue is fresh, so the lone exit event always fits.
        let _ = event_tx.try_send(OutputEvent::Exit(result));
        None
      }
    };

    BuildRun {
      events: event_rx,
      state: state_rx,
      cancel,
      pid,
    }
  }
}

/// Handle to a running build.
///
/// Dropping the run together with every [`CancelHandle`] cloned from it
/// cancels the build.
#[derive(Debug)]
pub struct BuildRun {
  events: mpsc::Receiver<OutputEvent>,
  state: watch::Receiver<BuildState>,
  cancel: CancelHandle,
  pid: Option<u32>,
}

impl BuildRun {
  /// Next output event, or `None` once `Exit` has been delivered.
  pub async fn next_event(&mut self) -> Option<OutputEvent> {
    self.events.recv().await
  }

  pub fn state(&self) -> BuildState {
    *self.state.borrow()
  }

  /// OS process id of the build command, if it was spawned.
  pub fn pid(&self) -> Option<u32> {
    self.pid
  }

  pub fn cancel_handle(&self) -> CancelHandle {
    self.cancel.clone()
  }

  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Discard remaining output and wait for the final result.
  pub async fn wait(mut self) -> BuildResult {
    while let Some(event) = self.events.recv().await {
      if let OutputEvent::Exit(result) = event {
        return result;
      }
    }
    BuildResult::interrupted()
  }
}

/// Requests termination of a running build. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelHandle {
  tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.tx.borrow()
  }
}

fn build_command(invocation: &BuildInvocation) -> Command {
  let mut command = Command::new(invocation.command());
  command
    .args(invocation.arguments())
    .envs(invocation.env())
    // A build in its own process group must not read the terminal.
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  if let Some(dir) = invocation.working_directory() {
    command.current_dir(dir);
  }

  // Lead a new process group so termination also reaches the tool's workers.
  #[cfg(unix)]
  command.process_group(0);

  command
}

async fn supervise(
  mut child: Child,
  invocation: BuildInvocation,
  events: mpsc::Sender<OutputEvent>,
  state: watch::Sender<BuildState>,
  mut cancel: watch::Receiver<bool>,
) {
  let pid = child.id();
  let limit = invocation.output_buffer_limit_bytes();
  let grace = invocation.termination_grace();
  let capture: SharedCapture = Arc::new(Mutex::new(StderrCapture::new(limit)));
  let (overflow_tx, mut overflow_rx) = mpsc::channel::<StreamKind>(2);
  let (exited_tx, exited_rx) = watch::channel(false);

  let mut readers = Vec::with_capacity(2);
  if let Some(stdout) = child.stdout.take() {
    readers.push(tokio::spawn(pump(
      stdout,
      StreamKind::Stdout,
      limit,
      events.clone(),
      overflow_tx.clone(),
      None,
      exited_rx.clone(),
    )));
  }
  if let Some(stderr) = child.stderr.take() {
    readers.push(tokio::spawn(pump(
      stderr,
      StreamKind::Stderr,
      limit,
      events.clone(),
      overflow_tx.clone(),
      Some(capture.clone()),
      exited_rx,
    )));
  }
  drop(overflow_tx);

  let mut overflow = None;
  let mut cancelled = false;

  let status = tokio::select! {
    status = child.wait() => status,
    Some(stream) = overflow_rx.recv() => {
      warn!(pid = ?pid, %stream, limit, "terminating build after buffer overflow");
      overflow = Some(stream);
      terminate(&mut child, pid, grace).await
    }
    _ = cancellation_requested(&mut cancel) => {
      info!(pid = ?pid, "terminating build on cancellation");
      cancelled = true;
      terminate(&mut child, pid, grace).await
    }
  };
  exited_tx.send_replace(true);

  if !drain(readers).await {
    // Whatever still holds the pipes belongs to the build's process group.
    force_kill(&mut child, pid);
  }

  // A reader may have overflowed while the child was already exiting.
  if overflow.is_none() {
    overflow = overflow_rx.try_recv().ok();
  }

  let captured_stderr = capture
    .lock()
    .map(|capture| capture.to_string_lossy())
    .unwrap_or_default();

  let result = build_result(status, overflow, cancelled, limit, captured_stderr);
  info!(
    pid = ?pid,
    success = result.exit_success,
    code = ?result.exit_code,
    reason = ?result.termination,
    "build finished"
  );

  state.send_replace(result.state());
  let _ = events.send(OutputEvent::Exit(result)).await;
}

fn build_result(
  status: io::Result<ExitStatus>,
  overflow: Option<StreamKind>,
  cancelled: bool,
  limit: usize,
  captured_stderr: String,
) -> BuildResult {
  let mut result = match (&status, overflow) {
    _ if cancelled => BuildResult::failure(TerminationReason::Cancelled, captured_stderr),
    (_, Some(stream)) => BuildResult::failure(
      TerminationReason::BufferOverflow { stream, limit },
      captured_stderr,
    ),
    (Ok(status), None) if status.success() => BuildResult::success(status.code(), captured_stderr),
    (Ok(_), None) => BuildResult::failure(TerminationReason::NonZeroExit, captured_stderr),
    (Err(e), None) => {
      warn!(error = %e, "failed to wait for build process");
      BuildResult::failure(TerminationReason::NonZeroExit, captured_stderr)
    }
  };

  if let Ok(status) = status {
    result.exit_code = status.code();
    result.signal = exit_signal(&status);
  }
  result
}

/// Resolves once cancellation is requested or every handle to the run is gone.
async fn cancellation_requested(cancel: &mut watch::Receiver<bool>) {
  let _ = cancel.wait_for(|requested| *requested).await;
}

/// Wait for the stream readers to finish.
///
/// No timeout here: a reader only lingers while the consumer is behind, and
/// gives up by itself on a stream held open past the child's exit. Returns
/// false if any reader gave up.
async fn drain(readers: Vec<JoinHandle<bool>>) -> bool {
  let mut clean = true;
  for reader in readers {
    clean &= matches!(reader.await, Ok(true));
  }
  clean
}

async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) -> io::Result<ExitStatus> {
  request_termination(child, pid);
  match tokio::time::timeout(grace, child.wait()).await {
    Ok(status) => status,
    Err(_) => {
      warn!(pid = ?pid, grace_ms = grace.as_millis() as u64, "build ignored termination request, killing");
      force_kill(child, pid);
      child.wait().await
    }
  }
}

#[cfg(unix)]
fn request_termination(_child: &mut Child, pid: Option<u32>) {
  signal_group(pid, rustix::process::Signal::TERM);
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, _pid: Option<u32>) {
  let _ = child.start_kill();
}

#[cfg(unix)]
fn force_kill(child: &mut Child, pid: Option<u32>) {
  signal_group(pid, rustix::process::Signal::KILL);
  let _ = child.start_kill();
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child, _pid: Option<u32>) {
  let _ = child.start_kill();
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: rustix::process::Signal) {
  use rustix::process::{Pid, kill_process_group};

  let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()).and_then(Pid::from_raw) else {
    return;
  };
  if let Err(e) = kill_process_group(pgid, signal) {
    // ESRCH once the whole group is gone
    debug!(pgid = ?pgid, error = %e, "failed to signal process group");
  }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
  use std::os::unix::process::ExitStatusExt;
  status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
  None
}
