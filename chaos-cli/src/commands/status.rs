//! Show configuration and live servers.

use anyhow::Result;
use chaos_core::ServerId;
use chaos_harness::{count_live, BootstrapCluster, Supervisor};
use std::path::Path;

use super::load_config;

/// Run the status command.
pub async fn run(path: &Path) -> Result<()> {
    let config = load_config(path)?;

    println!("Engula Chaos Status");
    println!("===================");
    println!();
    println!("Config:     {}", path.display());
    println!("Bootstrap:  {}", config.cluster.bootstrap.display());
    println!(
        "Servers:    {}",
        ServerId::all(config.cluster.servers)
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Wait:       down {}-{}ms, settle {}-{}ms",
        config.schedule.down_min_ms,
        config.schedule.down_max_ms,
        config.schedule.settle_min_ms,
        config.schedule.settle_max_ms
    );
    println!();

    let cluster = BootstrapCluster::new(&config.cluster);
    match cluster.status().await {
        Ok(output) => {
            let live = count_live(&output.stdout, &config.cluster.status_pattern);
            println!("Live:       {}/{}", live, config.cluster.servers);
            for line in output.stdout.lines() {
                println!("  {line}");
            }
        }
        Err(e) => println!("Live:       unknown ({e})"),
    }

    let supervisor = Supervisor::new(config.supervisor.clone());
    match supervisor.find_running().await {
        Ok(pids) if pids.is_empty() => println!("Supervisor: not running"),
        Ok(pids) => println!(
            "Supervisor: running (pid {})",
            pids.iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Err(e) => println!("Supervisor: unknown ({e})"),
    }

    Ok(())
}
