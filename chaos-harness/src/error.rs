//! Error types for the chaos harness.

use chaos_core::{ChaosError, Violation};
use thiserror::Error;

use crate::collection::CollectionError;
use crate::command::CommandError;

/// Errors that end a harness operation.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An external command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The cluster or workload showed an anomaly.
    #[error(transparent)]
    Chaos(#[from] ChaosError),

    /// A collection operation kept failing.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// What was being attempted.
        operation: String,
        /// How many attempts were made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: CollectionError,
    },

    /// Filesystem or process I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A workload task panicked or was cancelled.
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<Violation> for HarnessError {
    fn from(violation: Violation) -> Self {
        HarnessError::Chaos(violation.into())
    }
}
