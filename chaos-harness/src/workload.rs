//! Verifying read/write workload.
//!
//! Writers apply a seeded operation stream to a [`Collection`] and publish
//! how far they got. Readers replay the same streams with a [`Tracker`] per
//! writer and check what the collection holds. After the run duration the
//! writers stop, then every reader drains its trackers up to the final
//! published step, so the whole history is verified at least once.

use chaos_core::{Generator, Op, RoundOutcome, Tracker, Value, Violation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::collection::{Collection, CollectionError};
use crate::config::WorkloadConfig;
use crate::error::HarnessError;

/// Steps applied by one writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriterReport {
    /// Writer index, also tagged into every value it writes.
    pub index: u64,
    /// Operations applied and published.
    pub steps: u64,
}

/// Verification done by one reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderReport {
    /// Reader index.
    pub index: usize,
    /// Writers this reader traced.
    pub writers: Vec<u64>,
    /// Completed rounds over all traced writers.
    pub rounds: u64,
    /// Steps verified over all completed rounds.
    pub verified: u64,
}

/// Outcome of a workload run without violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadReport {
    /// Base seed; writer `i` generates from `seed + i`.
    pub seed: u64,
    /// Per-writer results, by index.
    pub writers: Vec<WriterReport>,
    /// Per-reader results, by index.
    pub readers: Vec<ReaderReport>,
}

/// Bounded retry of collection operations.
#[derive(Debug, Clone, Copy)]
struct Retry {
    attempts: u32,
    interval: Duration,
}

impl Retry {
    async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollectionError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => {
                    return Err(HarnessError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        operation,
                        attempt,
                        self.attempts,
                        e
                    );
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

/// Writers traced by `reader` when `readers` readers share the writers
/// round-robin. Empty for readers beyond the writer count.
pub fn assigned_writers(reader: usize, readers: usize, writers: usize) -> Vec<u64> {
    (reader..writers)
        .step_by(readers.max(1))
        .map(|w| w as u64)
        .collect()
}

/// Sleep for `duration`; true if shutdown was signalled first.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        // A dropped sender also ends the wait.
        _ = shutdown.changed() => true,
    }
}

struct Writer {
    index: u64,
    generator: Generator,
    collection: Arc<dyn Collection>,
    retry: Retry,
    interval: Duration,
    published: Arc<AtomicU64>,
}

impl Writer {
    async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<WriterReport, HarnessError> {
        let mut step = 0;
        // Shutdown is only honoured between operations, so every applied
        // operation is also published.
        while !*shutdown.borrow() {
            step += 1;
            match self.generator.next_op() {
                Op::Put { key, value } => {
                    let bytes = Value::new(self.index, step, value).encode();
                    self.retry
                        .run("put", || self.collection.put(&key, &bytes))
                        .await?;
                }
                Op::Delete { key } => {
                    self.retry
                        .run("delete", || self.collection.delete(&key))
                        .await?;
                }
            }
            self.published.store(step, Ordering::Release);
            if self.interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                wait_or_shutdown(&mut shutdown, self.interval).await;
            }
        }
        tracing::debug!("writer {} stopped at step {}", self.index, step);
        Ok(WriterReport {
            index: self.index,
            steps: step,
        })
    }
}

struct Traced {
    tracker: Tracker,
    published: Arc<AtomicU64>,
    verified: u64,
}

struct Reader {
    index: usize,
    traced: Vec<Traced>,
    collection: Arc<dyn Collection>,
    retry: Retry,
    tick: Duration,
}

impl Reader {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<ReaderReport, HarnessError> {
        loop {
            for i in 0..self.traced.len() {
                self.check_next(i, false).await?;
            }
            tokio::task::yield_now().await;
            if wait_or_shutdown(&mut shutdown, self.tick).await {
                break;
            }
        }

        tracing::debug!("reader {} draining", self.index);
        for i in 0..self.traced.len() {
            while !self.check_next(i, true).await? {
                tokio::task::yield_now().await;
            }
        }

        Ok(ReaderReport {
            index: self.index,
            writers: self.traced.iter().map(|t| t.tracker.writer()).collect(),
            rounds: self.traced.iter().map(|t| t.tracker.rounds()).sum(),
            verified: self.traced.iter().map(|t| t.verified).sum(),
        })
    }

    /// Verify one more step of tracker `i`. True when a round finished.
    ///
    /// While writers run, a replay that caught up with open expectations
    /// waits: they may refer to operations applied but not yet published.
    async fn check_next(&mut self, i: usize, draining: bool) -> Result<bool, HarnessError> {
        let traced = &mut self.traced[i];
        let published = traced.published.load(Ordering::Acquire);
        if !draining
            && traced.tracker.step() >= published
            && (published == 0 || !traced.tracker.expected().is_empty())
        {
            return Ok(false);
        }

        let op = match traced.tracker.advance(published) {
            Ok(RoundOutcome::Finished { steps }) => {
                tracing::debug!(
                    "reader {}: writer {} round {} verified {} steps",
                    self.index,
                    traced.tracker.writer(),
                    traced.tracker.rounds(),
                    steps
                );
                traced.verified += steps;
                return Ok(true);
            }
            Ok(RoundOutcome::Pending(op)) => op,
            Err(violation) => {
                self.report_violation(i, &violation);
                return Err(violation.into());
            }
        };

        let collection = &self.collection;
        let observed = self
            .retry
            .run("get", || collection.get(op.key()))
            .await?;
        let traced = &mut self.traced[i];
        if let Err(violation) = traced.tracker.observe(&op, observed.as_deref()) {
            self.report_violation(i, &violation);
            return Err(violation.into());
        }
        Ok(false)
    }

    fn report_violation(&self, i: usize, violation: &Violation) {
        let tracker = &self.traced[i].tracker;
        tracing::error!("reader {}: {}", self.index, violation);
        for (key, expectation) in tracker.expected() {
            tracing::error!(
                "reader {}: writer {} key {} still expects {:?}",
                self.index,
                tracker.writer(),
                String::from_utf8_lossy(key),
                expectation
            );
        }
    }
}

enum TaskOutput {
    Writer(WriterReport),
    Reader(ReaderReport),
}

/// A configured workload over one collection.
pub struct Workload {
    config: WorkloadConfig,
    collection: Arc<dyn Collection>,
}

impl Workload {
    /// Create a workload; nothing runs until [`Workload::run`].
    pub fn new(config: WorkloadConfig, collection: Arc<dyn Collection>) -> Self {
        Self { config, collection }
    }

    /// Run writers for `duration`, then drain readers.
    ///
    /// Ends early with the first violation or exhausted retry.
    pub async fn run(&self, duration: Duration) -> Result<WorkloadReport, HarnessError> {
        let seed = self.config.base_seed.unwrap_or_else(|| OsRng.next_u64());
        let retry = Retry {
            attempts: self.config.retry_attempts.max(1),
            interval: Duration::from_millis(self.config.retry_interval_ms),
        };
        let writer_count = self.config.writers;
        tracing::info!(
            "workload starting: {} writers, {} readers, seed {}, duration {:?}",
            writer_count,
            self.config.readers.min(writer_count),
            seed,
            duration
        );

        let (stop_writers, writers_rx) = watch::channel(false);
        let (stop_readers, readers_rx) = watch::channel(false);
        let mut tasks: JoinSet<Result<TaskOutput, HarnessError>> = JoinSet::new();

        let published: Vec<Arc<AtomicU64>> = (0..writer_count)
            .map(|_| Arc::new(AtomicU64::new(0)))
            .collect();

        for (index, published) in published.iter().enumerate() {
            let writer = Writer {
                index: index as u64,
                generator: Generator::new(
                    writer_seed(seed, index as u64),
                    self.config.generator.clone(),
                ),
                collection: Arc::clone(&self.collection),
                retry,
                interval: Duration::from_millis(self.config.op_interval_ms),
                published: Arc::clone(published),
            };
            let rx = writers_rx.clone();
            tasks.spawn(async move { writer.run(rx).await.map(TaskOutput::Writer) });
        }

        for index in 0..self.config.readers {
            let writers = assigned_writers(index, self.config.readers, writer_count);
            if writers.is_empty() {
                continue;
            }
            let reader = Reader {
                index,
                traced: writers
                    .iter()
                    .map(|&w| Traced {
                        tracker: Tracker::new(
                            w,
                            writer_seed(seed, w),
                            self.config.generator.clone(),
                        ),
                        published: Arc::clone(&published[w as usize]),
                        verified: 0,
                    })
                    .collect(),
                collection: Arc::clone(&self.collection),
                retry,
                tick: Duration::from_millis(self.config.tick_ms),
            };
            let rx = readers_rx.clone();
            tasks.spawn(async move { reader.run(rx).await.map(TaskOutput::Reader) });
        }

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let mut stopping = false;
        let mut writers_left = writer_count;
        let mut writers = Vec::with_capacity(writer_count);
        let mut readers = Vec::new();

        loop {
            tokio::select! {
                _ = &mut deadline, if !stopping => {
                    tracing::info!("workload duration elapsed, stopping writers");
                    stopping = true;
                    let _ = stop_writers.send(true);
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined?? {
                        TaskOutput::Writer(report) => {
                            writers.push(report);
                            writers_left -= 1;
                            if writers_left == 0 {
                                tracing::info!("writers stopped, draining readers");
                                let _ = stop_readers.send(true);
                            }
                        }
                        TaskOutput::Reader(report) => readers.push(report),
                    }
                }
            }
        }

        writers.sort_by_key(|w: &WriterReport| w.index);
        readers.sort_by_key(|r: &ReaderReport| r.index);
        let report = WorkloadReport {
            seed,
            writers,
            readers,
        };
        tracing::info!(
            "workload finished: {} steps written, {} verified",
            report.writers.iter().map(|w| w.steps).sum::<u64>(),
            report.readers.iter().map(|r| r.verified).sum::<u64>()
        );
        Ok(report)
    }
}

fn writer_seed(base: u64, writer: u64) -> u64 {
    base.wrapping_add(writer)
}
