//! Error types for chaos runs.

use std::path::PathBuf;
use thiserror::Error;

use crate::value::ValueError;

/// Anomalies that end a chaos run.
#[derive(Debug, Error)]
pub enum ChaosError {
    /// The cluster reports fewer (or more) live servers than configured.
    #[error("live server count mismatch: expected {expected}, found {live}")]
    LiveServerMismatch {
        /// Configured number of servers.
        expected: u32,
        /// Servers reported alive by the status command.
        live: u32,
    },

    /// Crash dumps appeared in a watched directory.
    #[error("found {} core dump(s), first: {}", .paths.len(), first_path(.paths))]
    CoreDumpsFound {
        /// Every dump that was found.
        paths: Vec<PathBuf>,
    },

    /// The supervisor process is gone.
    #[error("supervisor is not running")]
    SupervisorAbsent,

    /// A supervisor was already running before this run launched its own.
    #[error("supervisor already running (pids: {pids:?})")]
    SupervisorAlreadyRunning {
        /// Pids of the matching processes.
        pids: Vec<u32>,
    },

    /// The workload observed data the cluster should not have returned.
    #[error("workload violation: {0}")]
    Violation(#[from] Violation),
}

/// Consistency violations detected by a workload reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// A key returned a value older than the operation being verified.
    #[error("stale read of key {key} from writer {writer}: observed step {observed}, verifying step {verifying}")]
    StaleRead {
        /// Writer that owns the key.
        writer: u64,
        /// Key, lossily rendered.
        key: String,
        /// Step tagged in the value that was read.
        observed: u64,
        /// Step the reader was replaying.
        verifying: u64,
    },

    /// A key written at a step holds a different payload than was written.
    #[error("key {key} written by writer {writer} at step {step} holds a different value")]
    ValueMismatch {
        /// Writer that owns the key.
        writer: u64,
        /// Key, lossily rendered.
        key: String,
        /// Step of the put.
        step: u64,
    },

    /// Expectations were still open when the reader caught up with the writer.
    #[error("{count} unresolved expectation(s) for writer {writer} at step {step}")]
    Unresolved {
        /// Writer being traced.
        writer: u64,
        /// Number of open expectations.
        count: usize,
        /// Step the round ended at.
        step: u64,
    },

    /// A stored value could not be decoded.
    #[error("key {key} of writer {writer} holds a malformed value: {source}")]
    Malformed {
        /// Writer that owns the key.
        writer: u64,
        /// Key, lossily rendered.
        key: String,
        /// Framing error.
        #[source]
        source: ValueError,
    },
}

fn first_path(paths: &[PathBuf]) -> String {
    paths
        .first()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
