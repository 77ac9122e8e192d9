//! Chaos harness for engula clusters.
//!
//! Repeatedly restarts random servers of a cluster managed by `bootstrap.sh`
//! while the supervisor runs, and checks after every restart that:
//! - every server is back up
//! - nothing dumped core
//! - the supervisor survived
//!
//! A verifying read/write workload ([`workload`]) can run alongside to
//! check that no acknowledged write is lost.
//!
//! # Example
//!
//! ```no_run
//! use engula_chaos_harness::{ChaosRunner, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("engula-chaos.toml".as_ref())?;
//! let mut runner = ChaosRunner::from_config(&config);
//! let summary = runner.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! println!("{} healthy rounds", summary.rounds);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod collection;
pub mod command;
pub mod config;
pub mod coredump;
pub mod error;
pub mod health;
pub mod runner;
pub mod supervisor;
pub mod workload;

pub use cluster::{count_live, BootstrapCluster, Cluster};
pub use collection::{Collection, CollectionError, MemoryCollection};
pub use command::{CommandError, CommandOutput};
pub use config::{
    ClusterConfig, Config, ConfigError, RunConfig, SupervisorConfig, WorkloadConfig,
};
pub use coredump::{find_core_dumps, CORE_PREFIX};
pub use error::HarnessError;
pub use health::{HealthCheck, HealthReport};
pub use runner::{ChaosRunner, RunSummary};
pub use supervisor::Supervisor;
pub use workload::{ReaderReport, Workload, WorkloadReport, WriterReport};
