//! Supervisor process management.
//!
//! The supervisor runs in the background for the whole chaos run, in its own
//! process group so terminal signals aimed at the harness do not reach it.
//! Its stdout and stderr are appended to a log file.

use chaos_core::ChaosError;
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::command::{self, CommandError};
use crate::config::SupervisorConfig;
use crate::error::HarnessError;

/// Handle to the supervisor launched by this run.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    child: Option<Child>,
}

impl Supervisor {
    /// Create a handle; nothing is started yet.
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    /// Command-line pattern identifying supervisor processes.
    pub fn pattern(&self) -> String {
        self.config.binary.to_string_lossy().into_owned()
    }

    /// Pids of running processes that look like a supervisor.
    pub async fn find_running(&self) -> Result<Vec<u32>, CommandError> {
        find_processes(&self.pattern()).await
    }

    /// Fail if a supervisor is already running.
    ///
    /// Skipped when `check_existing` is off.
    pub async fn ensure_not_running(&self) -> Result<(), HarnessError> {
        if !self.config.check_existing {
            return Ok(());
        }
        let pids = self.find_running().await?;
        if !pids.is_empty() {
            return Err(ChaosError::SupervisorAlreadyRunning { pids }.into());
        }
        Ok(())
    }

    /// Start `<binary> [args...] --config <dir>` in the background.
    ///
    /// Returns the pid of the new process.
    pub async fn launch(&mut self) -> Result<u32, HarnessError> {
        let log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.log_file)
            .await?
            .into_std()
            .await;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&self.config.binary);
        command
            .args(&self.config.args)
            .arg("--config")
            .arg(&self.config.config_dir)
            .env("RUST_LOG", &self.config.rust_log)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| CommandError::Spawn {
            program: self.pattern(),
            source: e,
        })?;
        let pid = child.id().unwrap_or_default();
        tracing::info!(
            "supervisor started (pid {}), logging to {}",
            pid,
            self.config.log_file.display()
        );
        self.child = Some(child);
        Ok(pid)
    }

    /// Pid of the launched supervisor, if it is still known.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether the launched supervisor is still running.
    ///
    /// False if nothing was launched.
    pub fn is_alive(&mut self) -> std::io::Result<bool> {
        let Some(child) = self.child.as_mut() else {
            return Ok(false);
        };
        match child.try_wait()? {
            None => Ok(true),
            Some(status) => {
                tracing::warn!("supervisor exited: {}", status);
                Ok(false)
            }
        }
    }

    /// Kill the launched supervisor and reap it.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            child.start_kill()?;
            let status = child.wait().await?;
            tracing::info!("supervisor stopped: {}", status);
        }
        Ok(())
    }
}

/// Pids of processes whose command line matches `pattern` (`pgrep -f`).
///
/// The calling process is never included.
pub async fn find_processes(pattern: &str) -> Result<Vec<u32>, CommandError> {
    let output = command::exec("pgrep", ["-f", pattern], None).await?;
    match output.exit_code {
        0 => {
            let own = std::process::id();
            Ok(parse_pids(&output.stdout)
                .into_iter()
                .filter(|pid| *pid != own)
                .collect())
        }
        // pgrep: no process matched
        1 => Ok(Vec::new()),
        _ => output.ok().map(|_| Vec::new()),
    }
}

/// Parse one pid per line, ignoring anything that is not a number.
pub fn parse_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
