//! CLI smoke tests for buildwatch.
//!
//! These tests run the real binary against small shell commands standing in
//! for a front-end build tool.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the buildwatch binary.
fn bw_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("buildwatch");
  cmd.env_remove("BUILDWATCH_BUFFER_LIMIT");
  cmd
}

/// Create a temp directory containing a `buildwatch.json`.
fn temp_config(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("buildwatch.json"), content).unwrap();
  temp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  bw_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  bw_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("buildwatch"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["run", "show"] {
    bw_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// run
// =============================================================================

#[test]
#[cfg(unix)]
fn run_echo_relays_stdout() {
  bw_cmd()
    .args(["run", "--buffer-limit", "1024000", "--", "echo", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello"))
    .stderr(predicate::str::contains("Build finished"));
}

#[test]
#[cfg(unix)]
fn run_mirrors_exit_code() {
  bw_cmd()
    .args(["run", "--", "sh", "-c", "echo 'compile error' >&2; exit 3"])
    .assert()
    .code(3)
    .stderr(predicate::str::contains("compile error"))
    .stderr(predicate::str::contains("exit code 3"));
}

#[test]
#[cfg(unix)]
fn run_with_shell_flag() {
  bw_cmd()
    .args(["run", "--shell", "--", "echo one && echo two"])
    .assert()
    .success()
    .stdout(predicate::str::contains("one\ntwo\n"));
}

#[test]
fn run_with_shell_flag_rejects_split_command_line() {
  bw_cmd()
    .args(["run", "--shell", "--", "echo", "a  b", "&&", "touch", "x"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("one argument"));
}

#[test]
fn run_missing_tool_exits_127() {
  bw_cmd()
    .args(["run", "--", "definitely-not-a-build-tool-7f3a", "--watch"])
    .assert()
    .code(127)
    .stderr(predicate::str::contains("failed to start"));
}

#[test]
#[cfg(unix)]
fn run_oversized_output_is_killed() {
  bw_cmd()
    .args(["run", "--buffer-limit", "1024", "--", "sh", "-c", "printf '%5000s' ''; sleep 30"])
    .timeout(std::time::Duration::from_secs(20))
    .assert()
    .code(1)
    .stderr(predicate::str::contains("output limit"));
}

#[test]
#[cfg(unix)]
fn run_json_reports_result() {
  let output = bw_cmd()
    .args(["--format", "json", "run", "--", "sh", "-c", "echo built; echo 'warn' >&2"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["exit_success"], true);
  assert_eq!(result["captured_stderr"], "warn\n");
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("built"));
}

#[test]
#[cfg(unix)]
fn run_in_working_directory() {
  let temp = TempDir::new().unwrap();

  bw_cmd()
    .args(["run", "--cwd", temp.path().to_str().unwrap(), "--", "touch", "bundle.js"])
    .assert()
    .success();

  assert!(temp.path().join("bundle.js").exists());
}

#[test]
#[cfg(unix)]
fn run_uses_default_config_file() {
  let temp = temp_config(r#"{ "command": "echo", "args": ["from", "config"] }"#);

  bw_cmd()
    .current_dir(temp.path())
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("from config"));
}

#[test]
fn run_without_command_or_config_fails() {
  let temp = TempDir::new().unwrap();

  bw_cmd()
    .current_dir(temp.path())
    .arg("run")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("no build command given"));
}

#[test]
fn run_with_broken_config_fails() {
  let temp = temp_config(r#"{ "command": "ng", "script": "ng build" }"#);

  bw_cmd()
    .current_dir(temp.path())
    .arg("run")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("both `command` and `script`"));
}

// =============================================================================
// show
// =============================================================================

#[test]
fn show_resolves_config_and_flags() {
  let temp = temp_config(
    r#"{ "command": "ng", "args": ["build", "--output-path", "/srv/www/app", "--watch"], "buffer_limit": 2048 }"#,
  );

  bw_cmd()
    .args(["show", "--config"])
    .arg(temp.path().join("buildwatch.json"))
    .args(["--cwd", "frontend"])
    .assert()
    .success()
    .stdout(predicate::str::contains("ng build --output-path /srv/www/app --watch"))
    .stdout(predicate::str::contains("2048 bytes"))
    .stdout(predicate::str::contains("frontend"));
}

#[test]
fn show_env_overrides_file_limit() {
  let temp = temp_config(r#"{ "command": "tsc", "buffer_limit": 2048 }"#);

  bw_cmd()
    .current_dir(temp.path())
    .env("BUILDWATCH_BUFFER_LIMIT", "4096")
    .args(["--format", "json", "show"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"output_buffer_limit_bytes\": 4096"));
}

#[test]
fn show_flag_overrides_env() {
  bw_cmd()
    .env("BUILDWATCH_BUFFER_LIMIT", "4096")
    .args(["--format", "json", "show", "--buffer-limit", "512", "--grace", "250ms", "--", "tsc", "--watch"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"output_buffer_limit_bytes\": 512"))
    .stdout(predicate::str::contains("\"termination_grace\": 250"));
}
