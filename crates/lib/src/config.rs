//! Watch configuration files.
//!
//! A project describes its build once in a JSON file instead of repeating the
//! build tool's flags on every invocation:
//!
//! ```json
//! {
//!   "command": "ng",
//!   "args": ["build", "--output-path", "/srv/www/app", "--base-href", "/app/", "--watch"],
//!   "working_dir": "frontend",
//!   "buffer_limit": 1024000
//! }
//! ```
//!
//! Precedence, lowest first: file, `BUILDWATCH_BUFFER_LIMIT`, CLI flags (applied
//! by the caller on top of the loaded config).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::BUFFER_LIMIT_ENV;
use crate::invocation::{BuildInvocation, InvocationError};

/// Errors that can occur while loading a watch configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// Neither `command` nor `script` was given.
  #[error("config must set either `command` or `script`")]
  MissingCommand,

  /// Both `command` and `script` were given.
  #[error("config sets both `command` and `script`; pick one")]
  AmbiguousCommand,

  #[error("invalid value for {var}: {value:?} (expected a byte count)")]
  InvalidEnv { var: String, value: String },

  #[error(transparent)]
  Invocation(#[from] InvocationError),
}

/// On-disk description of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
  /// Program to run.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,

  /// Command line run through the platform shell, instead of `command`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub script: Option<String>,

  /// Shell override for `script`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub shell: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub buffer_limit: Option<usize>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub working_dir: Option<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub termination_grace_ms: Option<u64>,
}

impl WatchConfig {
  /// Load a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading watch config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Apply overrides from the process environment.
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(BUFFER_LIMIT_ENV) {
      let limit = value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnv {
        var: BUFFER_LIMIT_ENV.to_string(),
        value: value.clone(),
      })?;
      debug!(limit, "buffer limit overridden from environment");
      self.buffer_limit = Some(limit);
    }
    Ok(())
  }

  /// Turn the config into a validated invocation.
  pub fn to_invocation(&self) -> Result<BuildInvocation, ConfigError> {
    let mut builder = match (&self.command, &self.script) {
      (Some(_), Some(_)) => return Err(ConfigError::AmbiguousCommand),
      (None, None) => return Err(ConfigError::MissingCommand),
      (Some(command), None) => BuildInvocation::builder(command.as_str()),
      (None, Some(script)) => BuildInvocation::shell(script.as_str(), self.shell.as_deref()),
    };

    builder = builder.args(self.args.iter().cloned());
    if let Some(limit) = self.buffer_limit {
      builder = builder.buffer_limit(limit);
    }
    if let Some(dir) = &self.working_dir {
      builder = builder.working_dir(dir.as_str());
    }
    for (key, value) in &self.env {
      builder = builder.env(key.as_str(), value.as_str());
    }
    if let Some(ms) = self.termination_grace_ms {
      builder = builder.termination_grace(Duration::from_millis(ms));
    }

    Ok(builder.build()?)
  }
}
