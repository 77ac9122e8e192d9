//! Cluster health verification.
//!
//! A healthy cluster after a restart round means all three of:
//! - `bootstrap.sh status` reports every configured server alive
//! - no crash dump appeared in a watched directory
//! - the supervisor is still running

use chaos_core::ChaosError;
use serde::Serialize;
use std::path::PathBuf;

use crate::cluster::Cluster;
use crate::coredump::find_core_dumps;
use crate::error::HarnessError;

/// Observations from one health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Configured number of servers.
    pub expected: u32,
    /// Servers reported alive.
    pub live: u32,
    /// Crash dumps found.
    pub core_dumps: Vec<PathBuf>,
    /// Whether the supervisor is running.
    pub supervisor_alive: bool,
}

impl HealthReport {
    /// True if no anomaly was observed.
    pub fn is_healthy(&self) -> bool {
        self.live == self.expected && self.core_dumps.is_empty() && self.supervisor_alive
    }

    /// Return the first anomaly as an error.
    ///
    /// Checked in order: live count, crash dumps, supervisor.
    pub fn verify(&self) -> Result<(), ChaosError> {
        if self.live != self.expected {
            return Err(ChaosError::LiveServerMismatch {
                expected: self.expected,
                live: self.live,
            });
        }
        if !self.core_dumps.is_empty() {
            return Err(ChaosError::CoreDumpsFound {
                paths: self.core_dumps.clone(),
            });
        }
        if !self.supervisor_alive {
            return Err(ChaosError::SupervisorAbsent);
        }
        Ok(())
    }
}

/// Gathers a [`HealthReport`] from a cluster.
pub struct HealthCheck<'a> {
    cluster: &'a dyn Cluster,
    expected: u32,
    core_dump_dirs: &'a [PathBuf],
}

impl<'a> HealthCheck<'a> {
    /// Check `cluster` against `expected` live servers and the given dump dirs.
    pub fn new(cluster: &'a dyn Cluster, expected: u32, core_dump_dirs: &'a [PathBuf]) -> Self {
        Self {
            cluster,
            expected,
            core_dump_dirs,
        }
    }

    /// Collect observations. Supervisor liveness is supplied by the caller,
    /// who knows how to probe it.
    pub async fn run(&self, supervisor_alive: bool) -> Result<HealthReport, HarnessError> {
        let live = self.cluster.live_servers().await?;
        let core_dumps = find_core_dumps(self.core_dump_dirs).await?;
        let report = HealthReport {
            expected: self.expected,
            live,
            core_dumps,
            supervisor_alive,
        };
        tracing::debug!(?report, "health check");
        Ok(report)
    }
}
