use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{BuildArgs, cmd_run, cmd_show};
use output::{OutputFormat, Status, status};

/// buildwatch - run a front-end build tool and stream its output
#[derive(Parser)]
#[command(name = "buildwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, value_enum, default_value_t, global = true)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a build command, relaying its output until it exits
  Run {
    #[command(flatten)]
    build: BuildArgs,
  },

  /// Print the build invocation that `run` would execute
  Show {
    #[command(flatten)]
    build: BuildArgs,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let outcome = match cli.command {
    Commands::Run { build } => cmd_run(&build, cli.format),
    Commands::Show { build } => cmd_show(&build, cli.format).map(|_| 0),
  };

  match outcome {
    Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    Err(e) => {
      status(Status::Failed, &format!("{:#}", e));
      ExitCode::from(2)
    }
  }
}
