//! Implementation of the `buildwatch run` command.
//!
//! Starts the build, relays its output to the console until it exits (or
//! forever, for a watch-mode build), and reports how it ended. Ctrl-C cancels
//! the build.

use std::io;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use buildwatch_lib::{TerminationReason, relay, run};

use crate::cmd::{BuildArgs, resolve_invocation};
use crate::output::{OutputFormat, Status, elapsed, print_json, status};

/// Execute the run command.
///
/// Returns the process exit code: 0 on success, otherwise the build tool's
/// own code where there is one.
pub fn cmd_run(args: &BuildArgs, format: OutputFormat) -> Result<i32> {
  let invocation = resolve_invocation(args)?;
  let cmd = invocation.display_command();

  if !format.is_json() {
    status(Status::Running, &format!("Running {}", cmd));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();

  let result = rt.block_on(async {
    let mut build = run(invocation);

    let cancel = build.cancel_handle();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("interrupt received, stopping build");
        cancel.cancel();
      }
    });

    // Keep stdout clean for the JSON report.
    if format.is_json() {
      relay(&mut build, &mut io::stderr(), &mut io::stderr()).await
    } else {
      relay(&mut build, &mut io::stdout(), &mut io::stderr()).await
    }
  });

  let took = elapsed(started.elapsed());

  if format.is_json() {
    print_json(&result)?;
  } else {
    match &result.termination {
      None => status(Status::Done, &format!("Build finished in {}", took)),
      Some(TerminationReason::Cancelled) => status(Status::Cancelled, &format!("Build cancelled after {}", took)),
      Some(TerminationReason::NonZeroExit) => match (result.exit_code, result.signal) {
        (Some(code), _) => status(Status::Failed, &format!("Build failed with exit code {} after {}", code, took)),
        (None, Some(signal)) => status(Status::Failed, &format!("Build killed by signal {} after {}", signal, took)),
        (None, None) => status(Status::Failed, &format!("Build failed after {}", took)),
      },
      Some(reason) => status(Status::Failed, &format!("Build {}", reason)),
    }
  }

  Ok(result.exit_code_for_cli())
}
