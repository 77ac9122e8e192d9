//! One-shot health check of a running cluster.

use anyhow::Result;
use chaos_harness::{BootstrapCluster, Config, HealthCheck, HealthReport, Supervisor};
use std::path::Path;

use super::load_config;

/// Run the check command.
pub async fn run(path: &Path, json: bool) -> Result<()> {
    let config = load_config(path)?;
    let report = collect(&config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    report.verify()?;
    Ok(())
}

/// Gather a health report. The supervisor counts as alive if any process
/// matches its binary.
pub async fn collect(config: &Config) -> Result<HealthReport> {
    let supervisor = Supervisor::new(config.supervisor.clone());
    let supervisor_alive = match supervisor.find_running().await {
        Ok(pids) => !pids.is_empty(),
        Err(e) => {
            tracing::warn!("cannot look up supervisor processes: {}", e);
            false
        }
    };

    let cluster = BootstrapCluster::new(&config.cluster);
    let report = HealthCheck::new(
        &cluster,
        config.cluster.servers,
        &config.cluster.core_dump_dirs,
    )
    .run(supervisor_alive)
    .await?;
    Ok(report)
}

fn print_report(report: &HealthReport) {
    println!("Live servers: {}/{}", report.live, report.expected);
    if report.core_dumps.is_empty() {
        println!("Core dumps:   none");
    } else {
        println!("Core dumps:   {}", report.core_dumps.len());
        for path in &report.core_dumps {
            println!("  {}", path.display());
        }
    }
    println!(
        "Supervisor:   {}",
        if report.supervisor_alive {
            "running"
        } else {
            "not running"
        }
    );
    println!();
    println!(
        "{}",
        if report.is_healthy() {
            "Healthy"
        } else {
            "UNHEALTHY"
        }
    );
}
