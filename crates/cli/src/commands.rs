//! Shell commands run as deferred operations.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::debug;

/// Captured output of a command that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Errors from running a single shell command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The shell could not be started
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully
    #[error("`{command}` exited with {status}: {}", stderr.trim())]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Run `command` through `sh -c` and capture its output.
pub async fn run_shell(command: &str) -> Result<CommandOutput, CommandError> {
    debug!("Starting `{}`", command);

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(CommandError::Failed {
            command: command.to_string(),
            status: output.status,
            stderr,
        });
    }

    debug!("Finished `{}`", command);
    Ok(CommandOutput { stdout, stderr })
}

/// Parse a command list: one command per line, blank lines and `#`
/// comments skipped.
pub fn parse_command_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Read a command list from a file.
pub fn read_command_file(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(parse_command_list(&std::fs::read_to_string(path)?))
}
