//! Build invocation description.
//!
//! A [`BuildInvocation`] names the external build tool, its arguments and the
//! limits the watcher enforces while it runs. It is immutable once built; a
//! caller creates a fresh one for every run.
//!
//! Paths (working directory, output directories passed as arguments) are
//! treated as opaque strings and handed to the OS untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::consts::{DEFAULT_BUFFER_LIMIT, DEFAULT_TERMINATION_GRACE};
use crate::shell::get_shell;

/// Errors raised while validating an invocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvocationError {
  /// The command is empty or only whitespace.
  #[error("build command must not be empty")]
  EmptyCommand,

  /// A zero-byte ceiling would kill the build on its first byte of output.
  #[error("output buffer limit must be greater than zero")]
  ZeroBufferLimit,
}

/// An external build command plus the limits applied while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInvocation {
  command: String,
  arguments: Vec<String>,
  output_buffer_limit_bytes: usize,
  working_directory: Option<String>,
  env: BTreeMap<String, String>,
  #[serde(with = "duration_millis")]
  termination_grace: Duration,
}

impl BuildInvocation {
  /// Create an invocation with default limits.
  pub fn new<I, S>(command: impl Into<String>, args: I) -> Result<Self, InvocationError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::builder(command).args(args).build()
  }

  /// Create an invocation that runs `script` through the platform shell.
  pub fn shell(script: impl Into<String>, override_shell: Option<&str>) -> BuildInvocationBuilder {
    let (shell, shell_args) = get_shell(override_shell);
    Self::builder(shell).args(shell_args).arg(script)
  }

  pub fn builder(command: impl Into<String>) -> BuildInvocationBuilder {
    BuildInvocationBuilder {
      command: command.into(),
      arguments: Vec::new(),
      output_buffer_limit_bytes: DEFAULT_BUFFER_LIMIT,
      working_directory: None,
      env: BTreeMap::new(),
      termination_grace: DEFAULT_TERMINATION_GRACE,
    }
  }

  pub fn command(&self) -> &str {
    &self.command
  }

  pub fn arguments(&self) -> &[String] {
    &self.arguments
  }

  pub fn output_buffer_limit_bytes(&self) -> usize {
    self.output_buffer_limit_bytes
  }

  pub fn working_directory(&self) -> Option<&str> {
    self.working_directory.as_deref()
  }

  /// Variables set on top of the inherited environment.
  pub fn env(&self) -> &BTreeMap<String, String> {
    &self.env
  }

  pub fn termination_grace(&self) -> Duration {
    self.termination_grace
  }

  /// The command line as a single display string, for logs and summaries.
  pub fn display_command(&self) -> String {
    std::iter::once(self.command.as_str())
      .chain(self.arguments.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Builder for [`BuildInvocation`].
#[derive(Debug, Clone)]
pub struct BuildInvocationBuilder {
  command: String,
  arguments: Vec<String>,
  output_buffer_limit_bytes: usize,
  working_directory: Option<String>,
  env: BTreeMap<String, String>,
  termination_grace: Duration,
}

impl BuildInvocationBuilder {
  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.arguments.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.arguments.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn buffer_limit(mut self, bytes: usize) -> Self {
    self.output_buffer_limit_bytes = bytes;
    self
  }

  pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
    self.working_directory = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn termination_grace(mut self, grace: Duration) -> Self {
    self.termination_grace = grace;
    self
  }

  /// Validate and freeze the invocation.
  pub fn build(self) -> Result<BuildInvocation, InvocationError> {
    if self.command.trim().is_empty() {
      return Err(InvocationError::EmptyCommand);
    }
    if self.output_buffer_limit_bytes == 0 {
      return Err(InvocationError::ZeroBufferLimit);
    }

    Ok(BuildInvocation {
      command: self.command,
      arguments: self.arguments,
      output_buffer_limit_bytes: self.output_buffer_limit_bytes,
      working_directory: self.working_directory,
      env: self.env,
      termination_grace: self.termination_grace,
    })
  }
}

mod duration_millis {
  use std::time::Duration;

  use serde::Serializer;

  pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
  }
}
