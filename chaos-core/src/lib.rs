//! # chaos-core
//!
//! Pure logic for engula chaos runs (no I/O, instant tests).
//!
//! This crate holds the decisions a chaos run makes, without touching
//! processes, the filesystem or the network:
//! - [`Schedule`] - which server to restart next and how long to wait
//! - [`Generator`] - the seeded put/delete stream a workload writer replays
//! - [`Value`] - framing that tags every written value with writer and step
//! - [`Tracker`] - the reader side check of a writer's history
//!
//! The actual I/O (running `bootstrap.sh`, spawning the supervisor, talking
//! to a collection) lives in `chaos-harness`, which feeds observations into
//! these types and acts on their verdicts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod generator;
pub mod ids;
pub mod schedule;
pub mod tracker;
pub mod value;

pub use error::{ChaosError, Violation};
pub use generator::{Generator, GeneratorConfig, Op};
pub use ids::ServerId;
pub use schedule::{Round, Schedule, Timing};
pub use tracker::{Expectation, RoundOutcome, Tracker};
pub use value::{Value, ValueError, HEADER_LEN};
