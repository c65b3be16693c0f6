//! Implementation of the `buildwatch show` command.
//!
//! Prints the invocation a `run` with the same options would execute.

use anyhow::Result;

use crate::cmd::{BuildArgs, resolve_invocation};
use crate::output::{OutputFormat, elapsed, field, print_json};

pub fn cmd_show(args: &BuildArgs, format: OutputFormat) -> Result<()> {
  let invocation = resolve_invocation(args)?;

  if format.is_json() {
    return print_json(&invocation);
  }

  println!("Build:");
  field("Command", &invocation.display_command());
  field("Working dir", invocation.working_directory().unwrap_or("."));
  field(
    "Buffer limit",
    &format!("{} bytes per chunk", invocation.output_buffer_limit_bytes()),
  );
  field("Grace", &elapsed(invocation.termination_grace()));
  for (key, value) in invocation.env() {
    field("Env", &format!("{}={}", key, value));
  }

  Ok(())
}
