//! Run the verifying workload against an in-memory collection.

use anyhow::Result;
use chaos_harness::{MemoryCollection, Workload, WorkloadConfig, WorkloadReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::load_config;

/// Run the workload command.
pub async fn run(path: &Path, duration_secs: u64, seed: Option<u64>) -> Result<()> {
    let config = load_config(path)?;
    let report = execute(
        with_seed(config.workload, seed),
        Duration::from_secs(duration_secs),
    )
    .await?;
    print_report(&report);
    Ok(())
}

fn with_seed(mut config: WorkloadConfig, seed: Option<u64>) -> WorkloadConfig {
    if seed.is_some() {
        config.base_seed = seed;
    }
    config
}

async fn execute(config: WorkloadConfig, duration: Duration) -> Result<WorkloadReport> {
    let workload = Workload::new(config, Arc::new(MemoryCollection::new()));
    Ok(workload.run(duration).await?)
}

fn print_report(report: &WorkloadReport) {
    println!("Workload passed (seed {})", report.seed);
    println!();
    for writer in &report.writers {
        println!("  writer {}: {} steps", writer.index, writer.steps);
    }
    for reader in &report.readers {
        println!(
            "  reader {}: {} rounds, {} steps verified (writers {:?})",
            reader.index, reader.rounds, reader.verified, reader.writers
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_flag_overrides_config() {
        let config = WorkloadConfig {
            base_seed: Some(1),
            ..WorkloadConfig::default()
        };
        assert_eq!(with_seed(config.clone(), Some(5)).base_seed, Some(5));
        assert_eq!(with_seed(config, None).base_seed, Some(1));
    }

    #[tokio::test]
    async fn short_workload_passes() {
        let config = WorkloadConfig {
            base_seed: Some(3),
            tick_ms: 0,
            ..WorkloadConfig::default()
        };
        let report = execute(config, Duration::from_millis(100)).await.unwrap();
        assert_eq!(report.seed, 3);
        assert!(report.writers[0].steps > 0);
    }
}
