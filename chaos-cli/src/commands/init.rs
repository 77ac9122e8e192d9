//! Write a default configuration file.

use anyhow::{Context, Result};
use chaos_harness::Config;
use std::path::Path;

/// Run the init command.
pub async fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create config directory")?;
    }

    let config = Config::default();
    tokio::fs::write(path, config.to_toml()?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Configuration written to {}", path.display());
    println!();
    println!("  Bootstrap:  {}", config.cluster.bootstrap.display());
    println!("  Servers:    {}", config.cluster.servers);
    println!("  Supervisor: {}", config.supervisor.binary.display());
    println!();
    println!("Next steps:");
    println!("  1. Point cluster.bootstrap and supervisor.binary at your build");
    println!("  2. Check the cluster: engula-chaos --config {} status", path.display());
    println!("  3. Start the loop:    engula-chaos --config {} run", path.display());

    Ok(())
}
