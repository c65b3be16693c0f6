mod run;
mod show;

pub use run::cmd_run;
pub use show::cmd_show;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;

use buildwatch_lib::consts::CONFIG_FILE_NAME;
use buildwatch_lib::{BuildInvocation, WatchConfig};

/// Options describing which build to run.
#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Config file (defaults to ./buildwatch.json when no command is given)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Largest single output chunk, in bytes, before the build is killed
  #[arg(long)]
  pub buffer_limit: Option<usize>,

  /// Working directory for the build command
  #[arg(long)]
  pub cwd: Option<String>,

  /// Time to wait after a termination request before killing (e.g. "5s", "500ms")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub grace: Option<Duration>,

  /// Run the command line through the platform shell; pass it as a single
  /// quoted argument, e.g. `--shell -- "npm run build && cp -r dist /srv/www"`
  #[arg(long)]
  pub shell: bool,

  /// Build command and its arguments
  #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
  pub command: Vec<String>,
}

/// Resolve the invocation: config file, then environment, then flags.
pub fn resolve_invocation(args: &BuildArgs) -> Result<BuildInvocation> {
  let mut config = match (&args.config, args.command.is_empty()) {
    (Some(path), _) => load_config(path)?,
    (None, true) => {
      let default_path = Path::new(CONFIG_FILE_NAME);
      if !default_path.exists() {
        bail!("no build command given and {} not found", CONFIG_FILE_NAME);
      }
      load_config(default_path)?
    }
    (None, false) => WatchConfig::default(),
  };

  if let Some((program, rest)) = args.command.split_first() {
    if args.shell {
      if !rest.is_empty() {
        bail!(
          "--shell takes the whole command line as one argument, got {}; quote it",
          args.command.len()
        );
      }
      config.command = None;
      config.args.clear();
      config.script = Some(program.clone());
    } else {
      config.script = None;
      config.command = Some(program.clone());
      config.args = rest.to_vec();
    }
  }

  config.apply_env()?;

  if let Some(limit) = args.buffer_limit {
    config.buffer_limit = Some(limit);
  }
  if let Some(cwd) = &args.cwd {
    config.working_dir = Some(cwd.clone());
  }
  if let Some(grace) = args.grace {
    config.termination_grace_ms = Some(grace.as_millis() as u64);
  }

  Ok(config.to_invocation()?)
}

fn load_config(path: &Path) -> Result<WatchConfig> {
  WatchConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}
