//! Console output for the CLI.
//!
//! Status lines go to stderr so they never interleave with a build's own
//! stdout, which is relayed verbatim. `show` and `--format json` reports are
//! the only things buildwatch itself writes to stdout.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// How a status line is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Running,
  Done,
  Cancelled,
  Failed,
}

impl Status {
  fn symbol(self) -> &'static str {
    match self {
      Status::Running => "•",
      Status::Done => "✓",
      Status::Cancelled => "⚠",
      Status::Failed => "✗",
    }
  }
}

/// Print one status line on stderr.
pub fn status(status: Status, message: &str) {
  let symbol = status.symbol();
  match status {
    Status::Running => eprintln!("{} {}", symbol.if_supports_color(Stream::Stderr, |s| s.blue()), message),
    Status::Done => eprintln!("{} {}", symbol.if_supports_color(Stream::Stderr, |s| s.green()), message),
    Status::Cancelled => eprintln!(
      "{} {}",
      symbol.if_supports_color(Stream::Stderr, |s| s.yellow()),
      message.if_supports_color(Stream::Stderr, |s| s.yellow())
    ),
    Status::Failed => eprintln!(
      "{} {}",
      symbol.if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    ),
  }
}

/// Print a `label: value` line of the `show` report.
pub fn field(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Millisecond-precision human duration, e.g. `1s 500ms`.
pub fn elapsed(duration: Duration) -> String {
  let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}
