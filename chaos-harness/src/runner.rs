//! The chaos loop.
//!
//! ```text
//! setup -> supervisor launch -> { stop random server, wait, start, settle, verify } ...
//! ```
//!
//! The first anomaly ends the run with an error. The supervisor is left
//! running in that case so its state can be inspected; it is stopped when
//! the run ends normally or is interrupted.

use chaos_core::{Round, Schedule};
use rand::rngs::OsRng;
use rand::RngCore;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::cluster::{BootstrapCluster, Cluster};
use crate::config::Config;
use crate::error::HarnessError;
use crate::health::HealthCheck;
use crate::supervisor::Supervisor;

/// How a run ended without an anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Identifier attached to every log line of the run.
    pub run_id: Uuid,
    /// Schedule seed, to replay the same rounds.
    pub seed: u64,
    /// Rounds that completed and verified healthy.
    pub rounds: u64,
    /// True if the run was stopped by the shutdown signal.
    pub interrupted: bool,
}

enum RoundResult {
    Healthy,
    Interrupted,
}

/// Drives restart rounds against a cluster.
pub struct ChaosRunner<C: Cluster> {
    cluster: C,
    supervisor: Supervisor,
    schedule: Schedule,
    servers: u32,
    core_dump_dirs: Vec<PathBuf>,
    iterations: Option<u64>,
    skip_setup: bool,
    run_id: Uuid,
}

impl ChaosRunner<BootstrapCluster> {
    /// Runner over the configured `bootstrap.sh`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(BootstrapCluster::new(&config.cluster), config)
    }
}

impl<C: Cluster> ChaosRunner<C> {
    /// Runner over an arbitrary cluster implementation.
    pub fn new(cluster: C, config: &Config) -> Self {
        let seed = config.run.seed.unwrap_or_else(|| OsRng.next_u64());
        Self {
            cluster,
            supervisor: Supervisor::new(config.supervisor.clone()),
            schedule: Schedule::new(config.cluster.servers, config.schedule.clone(), seed),
            servers: config.cluster.servers,
            core_dump_dirs: config.cluster.core_dump_dirs.clone(),
            iterations: config.run.iterations,
            skip_setup: config.run.skip_setup,
            run_id: Uuid::new_v4(),
        }
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Schedule seed of this run.
    pub fn seed(&self) -> u64 {
        self.schedule.seed()
    }

    /// The supervisor handle, e.g. to stop it after a failed run.
    pub fn supervisor_mut(&mut self) -> &mut Supervisor {
        &mut self.supervisor
    }

    /// Run until the iteration limit, an anomaly, or `shutdown` resolves.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<RunSummary, HarnessError>
    where
        F: Future<Output = ()>,
    {
        let span = tracing::info_span!("chaos", run_id = %self.run_id);
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner<F>(&mut self, shutdown: F) -> Result<RunSummary, HarnessError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(
            "chaos run starting: {} servers, seed {}, iterations {}",
            self.servers,
            self.schedule.seed(),
            self.iterations
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".into())
        );

        // First poll of `shutdown`, so a listener armed on poll is armed now.
        if has_fired(shutdown.as_mut()).await {
            tracing::info!("interrupted before setup");
            return Ok(self.summary(0, true));
        }

        if self.skip_setup {
            tracing::info!("skipping cluster setup");
        } else {
            tracing::info!("setting up cluster");
            self.cluster.setup().await?;
        }
        if has_fired(shutdown.as_mut()).await {
            tracing::info!("interrupted during setup, supervisor not launched");
            return Ok(self.summary(0, true));
        }

        self.supervisor.ensure_not_running().await?;
        self.supervisor.launch().await?;

        let mut rounds = 0;
        let mut interrupted = false;
        while self.iterations.map_or(true, |limit| rounds < limit) {
            let round = self.schedule.next_round();
            match self.round(round, shutdown.as_mut()).await {
                Ok(RoundResult::Healthy) => rounds += 1,
                Ok(RoundResult::Interrupted) => {
                    tracing::info!("interrupted during round {}", round.number);
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    tracing::error!("round {} failed: {}", round.number, e);
                    return Err(e);
                }
            }
        }

        self.supervisor.shutdown().await?;
        tracing::info!("chaos run finished after {} healthy rounds", rounds);
        Ok(self.summary(rounds, interrupted))
    }

    fn summary(&self, rounds: u64, interrupted: bool) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            seed: self.schedule.seed(),
            rounds,
            interrupted,
        }
    }

    async fn round<F>(
        &mut self,
        round: Round,
        mut shutdown: Pin<&mut F>,
    ) -> Result<RoundResult, HarnessError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "round {}: stopping server {} for {}ms",
            round.number,
            round.server,
            round.downtime.as_millis()
        );
        self.cluster.stop(round.server).await?;
        let interrupted = sleep_or_shutdown(round.downtime, shutdown.as_mut()).await;

        // Bring the server back even when interrupted.
        tracing::info!("round {}: starting server {}", round.number, round.server);
        self.cluster.start(round.server).await?;
        if interrupted {
            return Ok(RoundResult::Interrupted);
        }

        tracing::debug!("round {}: settling {}ms", round.number, round.settle.as_millis());
        if sleep_or_shutdown(round.settle, shutdown.as_mut()).await {
            return Ok(RoundResult::Interrupted);
        }

        let supervisor_alive = self.supervisor.is_alive()?;
        let report = HealthCheck::new(&self.cluster, self.servers, &self.core_dump_dirs)
            .run(supervisor_alive)
            .await?;
        report.verify()?;

        tracing::info!(
            "round {}: healthy ({}/{} servers live)",
            round.number,
            report.live,
            report.expected
        );
        Ok(RoundResult::Healthy)
    }
}

/// True if `shutdown` has already resolved. Does not wait.
async fn has_fired<F>(shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = shutdown => true,
        _ = std::future::ready(()) => false,
    }
}

/// Sleep for `duration`; true if `shutdown` fired first.
async fn sleep_or_shutdown<F>(duration: Duration, shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown => true,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::command::CommandError;
    use crate::config::SupervisorConfig;
    use async_trait::async_trait;
    use chaos_core::{ChaosError, ServerId, Timing};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::task::Poll;
    use std::sync::{Arc, Mutex};

    /// Records every call; reports `live` servers alive.
    #[derive(Clone, Default)]
    struct ScriptedCluster {
        calls: Arc<Mutex<Vec<String>>>,
        live: Arc<AtomicU32>,
        setup_delay: Duration,
        stop_delay: Duration,
        /// Set by a test's shutdown future once it has been polled.
        listener: Arc<AtomicBool>,
        /// Whether `listener` was already set when setup ran.
        listener_at_setup: Arc<AtomicBool>,
    }

    impl ScriptedCluster {
        fn with_live(live: u32) -> Self {
            let cluster = Self::default();
            cluster.live.store(live, Ordering::SeqCst);
            cluster
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Cluster for ScriptedCluster {
        async fn setup(&self) -> Result<(), CommandError> {
            self.listener_at_setup
                .store(self.listener.load(Ordering::SeqCst), Ordering::SeqCst);
            self.record("setup".into());
            tokio::time::sleep(self.setup_delay).await;
            Ok(())
        }

        async fn stop(&self, server: ServerId) -> Result<(), CommandError> {
            self.record(format!("stop {server}"));
            tokio::time::sleep(self.stop_delay).await;
            Ok(())
        }

        async fn start(&self, server: ServerId) -> Result<(), CommandError> {
            self.record(format!("start {server}"));
            Ok(())
        }

        async fn live_servers(&self) -> Result<u32, CommandError> {
            Ok(self.live.load(Ordering::SeqCst))
        }
    }

    fn instant() -> Timing {
        Timing {
            down_min_ms: 0,
            down_max_ms: 5,
            settle_min_ms: 0,
            settle_max_ms: 5,
        }
    }

    fn test_config(dir: &Path, supervisor_script: &str) -> Config {
        let mut config = Config::default();
        config.cluster.servers = 3;
        config.cluster.core_dump_dirs = vec![dir.join("dumps")];
        config.schedule = instant();
        config.run.seed = Some(7);
        config.run.iterations = Some(4);
        config.supervisor = SupervisorConfig {
            binary: "sh".into(),
            args: vec!["-c".into(), supervisor_script.into(), "supervisor".into()],
            config_dir: dir.join("config"),
            log_file: dir.join("supervisor.log"),
            rust_log: "info".into(),
            check_existing: false,
        };
        std::fs::create_dir_all(dir.join("dumps")).unwrap();
        config
    }

    fn expected_calls(config: &Config, rounds: u64) -> Vec<String> {
        let mut schedule = Schedule::new(
            config.cluster.servers,
            config.schedule.clone(),
            config.run.seed.unwrap(),
        );
        let mut calls = vec!["setup".to_string()];
        for _ in 0..rounds {
            let server = schedule.next_round().server;
            calls.push(format!("stop {server}"));
            calls.push(format!("start {server}"));
        }
        calls
    }

    #[tokio::test]
    async fn healthy_rounds_follow_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "sleep 30");
        let cluster = ScriptedCluster::with_live(3);
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        let summary = runner.run_until(std::future::pending()).await.unwrap();

        assert_eq!(summary.rounds, 4);
        assert_eq!(summary.seed, 7);
        assert!(!summary.interrupted);
        assert_eq!(cluster.calls(), expected_calls(&config, 4));
        assert!(!runner.supervisor_mut().is_alive().unwrap());
    }

    #[tokio::test]
    async fn setup_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "sleep 30");
        config.run.skip_setup = true;
        config.run.iterations = Some(1);
        let cluster = ScriptedCluster::with_live(3);
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        runner.run_until(std::future::pending()).await.unwrap();

        let calls = cluster.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("stop "));
    }

    #[tokio::test]
    async fn missing_server_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "sleep 30");
        let cluster = ScriptedCluster::with_live(2);
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        let err = runner.run_until(std::future::pending()).await.unwrap_err();
        runner.supervisor_mut().shutdown().await.unwrap();

        assert!(matches!(
            err,
            HarnessError::Chaos(ChaosError::LiveServerMismatch {
                expected: 3,
                live: 2
            })
        ));
        // setup + one stop/start pair, nothing after the failed check
        assert_eq!(cluster.calls(), expected_calls(&config, 1));
    }

    #[tokio::test]
    async fn core_dump_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "sleep 30");
        std::fs::write(dir.path().join("dumps").join("core.31337"), b"").unwrap();
        let mut runner = ChaosRunner::new(ScriptedCluster::with_live(3), &config);

        let err = runner.run_until(std::future::pending()).await.unwrap_err();
        runner.supervisor_mut().shutdown().await.unwrap();

        match err {
            HarnessError::Chaos(ChaosError::CoreDumpsFound { paths }) => {
                assert_eq!(paths, vec![dir.path().join("dumps").join("core.31337")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dead_supervisor_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "exit 0");
        // Give the supervisor time to exit before the first check.
        config.schedule.settle_min_ms = 300;
        config.schedule.settle_max_ms = 300;
        let mut runner = ChaosRunner::new(ScriptedCluster::with_live(3), &config);

        let err = runner.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Chaos(ChaosError::SupervisorAbsent)
        ));
    }

    #[tokio::test]
    async fn interrupt_restarts_stopped_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "sleep 30");
        config.run.iterations = None;
        config.schedule.down_min_ms = 60_000;
        config.schedule.down_max_ms = 60_000;
        let cluster = ScriptedCluster::with_live(3);
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        let summary = runner
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.rounds, 0);
        assert_eq!(cluster.calls(), expected_calls(&config, 1));
        assert!(!runner.supervisor_mut().is_alive().unwrap());
    }

    #[tokio::test]
    async fn unseeded_runs_draw_a_seed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "sleep 30");
        config.run.seed = None;
        let a = ChaosRunner::new(ScriptedCluster::default(), &config);
        let b = ChaosRunner::new(ScriptedCluster::default(), &config);
        assert_ne!(a.run_id(), b.run_id());
        // Seeds are 64-bit random; a collision here means the RNG is broken.
        assert_ne!(a.seed(), b.seed());
    }

    #[tokio::test]
    async fn shutdown_is_watched_before_setup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "sleep 30");
        config.run.iterations = Some(1);
        let cluster = ScriptedCluster::with_live(3);
        let listener = Arc::clone(&cluster.listener);
        let shutdown = std::future::poll_fn(move |_| {
            listener.store(true, Ordering::SeqCst);
            Poll::<()>::Pending
        });
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        runner.run_until(shutdown).await.unwrap();

        assert!(cluster.listener_at_setup.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn interrupt_during_setup_skips_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "sleep 30");
        let cluster = ScriptedCluster {
            setup_delay: Duration::from_millis(300),
            ..ScriptedCluster::with_live(3)
        };
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        let summary = runner
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.rounds, 0);
        assert_eq!(cluster.calls(), vec!["setup".to_string()]);
        assert!(runner.supervisor_mut().pid().is_none());
        assert!(!dir.path().join("supervisor.log").exists());
    }

    #[tokio::test]
    async fn interrupt_during_stop_restarts_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "sleep 30");
        config.run.iterations = None;
        config.schedule.down_min_ms = 60_000;
        config.schedule.down_max_ms = 60_000;
        let cluster = ScriptedCluster {
            stop_delay: Duration::from_millis(1000),
            ..ScriptedCluster::with_live(3)
        };
        let mut runner = ChaosRunner::new(cluster.clone(), &config);

        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            runner.run_until(tokio::time::sleep(Duration::from_millis(150))),
        )
        .await
        .expect("interrupt should cut the downtime short")
        .unwrap();

        assert!(summary.interrupted);
        assert_eq!(cluster.calls(), expected_calls(&config, 1));
        assert!(!runner.supervisor_mut().is_alive().unwrap());
    }
}
