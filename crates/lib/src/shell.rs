//! Platform shell selection.
//!
//! Used when a build is described as a single command line rather than a
//! program plus arguments.

/// Get the shell command and arguments for the current platform.
///
/// # Arguments
///
/// * `override_shell` - Optional shell override from config
///
/// # Returns
///
/// A tuple of (shell_command, shell_arguments). The command line to run is
/// appended after the arguments.
///
/// # Note
///
/// `/bin/sh` is used on Unix rather than `$SHELL`, since interactive shells
/// may source profile files with side effects on every rebuild.
pub fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      // Assume Unix-style shell (bash, sh, zsh, etc.)
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    (
      "powershell.exe".to_string(),
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    )
  }
}
