//! The chaos loop.

use anyhow::{Context, Result};
use chaos_harness::{ChaosRunner, Config};
use std::path::Path;

use super::{interrupt_listener, load_config};

/// Command-line values that take precedence over `[run]`.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Round limit.
    pub iterations: Option<u64>,
    /// Schedule seed.
    pub seed: Option<u64>,
    /// Skip `bootstrap.sh setup`.
    pub skip_setup: bool,
}

impl Overrides {
    /// Apply to a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if self.iterations.is_some() {
            config.run.iterations = self.iterations;
        }
        if self.seed.is_some() {
            config.run.seed = self.seed;
        }
        if self.skip_setup {
            config.run.skip_setup = true;
        }
    }
}

/// Run the run command.
pub async fn run(path: &Path, overrides: Overrides) -> Result<()> {
    let interrupted = interrupt_listener().context("Failed to listen for Ctrl-C")?;
    let mut config = load_config(path)?;
    overrides.apply(&mut config);

    let mut runner = ChaosRunner::from_config(&config);
    println!("Run {} (seed {})", runner.run_id(), runner.seed());

    let summary = runner.run_until(interrupted).await?;

    if summary.interrupted {
        println!("Interrupted after {} healthy rounds.", summary.rounds);
    } else {
        println!("Completed {} healthy rounds.", summary.rounds);
    }
    println!("Replay with: --seed {}", summary.seed);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = Config::default();
        config.run.iterations = Some(100);
        config.run.seed = Some(1);

        Overrides {
            iterations: Some(5),
            seed: Some(9),
            skip_setup: true,
        }
        .apply(&mut config);

        assert_eq!(config.run.iterations, Some(5));
        assert_eq!(config.run.seed, Some(9));
        assert!(config.run.skip_setup);
    }

    #[test]
    fn empty_overrides_keep_config_values() {
        let mut config = Config::default();
        config.run.iterations = Some(100);
        config.run.skip_setup = true;

        Overrides::default().apply(&mut config);

        assert_eq!(config.run.iterations, Some(100));
        assert!(config.run.skip_setup);
    }
}
