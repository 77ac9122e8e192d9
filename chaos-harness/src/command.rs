//! External command execution.
//!
//! Uses `tokio::process::Command` to run `bootstrap.sh`, `pgrep` and friends,
//! capturing stdout and stderr.

use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was executed.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process returned a non-zero exit code.
    #[error("{command} failed: exit={exit_code}, stderr={stderr}")]
    Failed {
        /// Full command line.
        command: String,
        /// Exit code (-1 if killed by a signal).
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },
}

/// Result of running an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Full command line, for messages.
    pub command: String,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (0 = success, -1 = killed by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Convert a non-zero exit into an error.
    pub fn ok(self) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                command: self.command,
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Run `program args...` and capture its output.
///
/// Does NOT fail on non-zero exit; use [`exec_ok`] for that.
pub async fn exec<I, S>(
    program: impl AsRef<OsStr>,
    args: I,
    cwd: Option<&Path>,
) -> Result<CommandOutput, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let args: Vec<S> = args.into_iter().collect();

    let mut command = tokio::process::Command::new(program);
    command.args(&args).stdin(std::process::Stdio::null());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let rendered = render(program, &args);
    tracing::debug!("exec: {}", rendered);

    let output = command.output().await.map_err(|e| CommandError::Spawn {
        program: program.to_string_lossy().into_owned(),
        source: e,
    })?;

    Ok(CommandOutput {
        command: rendered,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Run a command, failing on non-zero exit.
pub async fn exec_ok<I, S>(
    program: impl AsRef<OsStr>,
    args: I,
    cwd: Option<&Path>,
) -> Result<CommandOutput, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    exec(program, args, cwd).await?.ok()
}

fn render<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    let mut parts = vec![program.to_string_lossy().into_owned()];
    parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
    parts.join(" ")
}
