//! CLI command implementations.

pub mod check;
pub mod init;
pub mod run;
pub mod status;
pub mod workload;

use anyhow::{Context, Result};
use chaos_harness::Config;
use std::future::Future;
use std::path::Path;

/// Load and validate the configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "No configuration at {}. Run `engula-chaos init` first.",
            path.display()
        );
    }
    Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Register for Ctrl-C now and return a future that resolves on it.
///
/// The handler is installed before this returns, so an interrupt that
/// arrives before the future is first polled is still delivered.
pub fn interrupt_listener() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut signal =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    #[cfg(windows)]
    let mut signal = tokio::signal::windows::ctrl_c()?;

    Ok(async move {
        if signal.recv().await.is_none() {
            tracing::warn!("Ctrl-C listener closed");
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl-C");
    })
}
