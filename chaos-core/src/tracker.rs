//! Reader-side verification of a writer's history.
//!
//! A [`Tracker`] replays one writer's operation stream (same seed, same
//! config) and checks, step by step, what the collection returns for each
//! key. Because the collection is read after the writer has moved on, a key
//! may already reflect a later step. Those cases are recorded as
//! [`Expectation`]s that a later step of the same replay must resolve:
//!
//! - a put whose key now holds a newer value expects that newer put
//! - a put whose key is now absent expects a later delete
//! - a delete whose key now holds a value expects the put that wrote it
//!
//! When the replay catches up with the writer's published step the round
//! ends. Any expectation still open at that point means the collection lost
//! or invented an operation.
//!
//! Writers publish a step only after the operation was applied, so a value
//! tagged with a step older than the one being replayed is a stale read.

use std::collections::HashMap;

use crate::error::Violation;
use crate::generator::{Generator, GeneratorConfig, Op};
use crate::value::Value;

/// What a later step of the replay must observe for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The put at `step` must be replayed.
    Existed {
        /// Step tagged in the observed value.
        step: u64,
    },
    /// A delete must be replayed.
    Deleted,
}

/// Result of advancing a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The replay caught up and every expectation was resolved.
    Finished {
        /// Steps verified in this round.
        steps: u64,
    },
    /// The next operation to check. Read its key and call [`Tracker::observe`].
    Pending(Op),
}

/// Replays and checks one writer's operation stream.
#[derive(Debug)]
pub struct Tracker {
    writer: u64,
    step: u64,
    rounds: u64,
    generator: Generator,
    expected: HashMap<Vec<u8>, Expectation>,
}

impl Tracker {
    /// Create a tracker for `writer`, which generates from `seed`.
    pub fn new(writer: u64, seed: u64, config: GeneratorConfig) -> Self {
        Self {
            writer,
            step: 0,
            rounds: 0,
            generator: Generator::new(seed, config),
            expected: HashMap::new(),
        }
    }

    /// Index of the traced writer.
    pub fn writer(&self) -> u64 {
        self.writer
    }

    /// Step currently being verified (0 before the first advance of a round).
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Completed rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Open expectations.
    pub fn expected(&self) -> &HashMap<Vec<u8>, Expectation> {
        &self.expected
    }

    /// Move to the next step, given the writer's published step.
    ///
    /// Ends the round when the replay has caught up with `published`.
    pub fn advance(&mut self, published: u64) -> Result<RoundOutcome, Violation> {
        if self.step >= published {
            return self.finish_round();
        }

        self.step += 1;
        let op = self.generator.next_op();
        self.resolve(&op);
        Ok(RoundOutcome::Pending(op))
    }

    /// Check what the collection returned for the key of the pending `op`.
    ///
    /// `observed` is the raw stored bytes, `None` if the key is absent.
    /// Safe to call again for the same step after a failed read.
    pub fn observe(&mut self, op: &Op, observed: Option<&[u8]>) -> Result<(), Violation> {
        let key = op.key();
        let value = match observed {
            Some(bytes) => Some(Value::decode(bytes).map_err(|source| Violation::Malformed {
                writer: self.writer,
                key: render(key),
                source,
            })?),
            None => None,
        };

        // A key shared with another writer carries no information about ours.
        if let Some(v) = &value {
            if v.writer() != self.writer {
                return Ok(());
            }
        }

        match (op, value) {
            (Op::Delete { .. }, None) => {}
            (Op::Delete { .. }, Some(v)) => {
                if v.step() <= self.step {
                    return Err(self.stale(key, v.step()));
                }
                self.expected
                    .insert(key.to_vec(), Expectation::Existed { step: v.step() });
            }
            (Op::Put { .. }, None) => {
                self.expected.insert(key.to_vec(), Expectation::Deleted);
            }
            (Op::Put { value: written, .. }, Some(v)) => {
                if v.step() < self.step {
                    return Err(self.stale(key, v.step()));
                }
                if v.step() == self.step {
                    if v.payload() != written.as_slice() {
                        return Err(Violation::ValueMismatch {
                            writer: self.writer,
                            key: render(key),
                            step: self.step,
                        });
                    }
                } else {
                    self.expected
                        .insert(key.to_vec(), Expectation::Existed { step: v.step() });
                }
            }
        }
        Ok(())
    }

    fn resolve(&mut self, op: &Op) {
        let key = op.key();
        let resolved = match (op, self.expected.get(key)) {
            (Op::Delete { .. }, Some(Expectation::Deleted)) => true,
            (Op::Put { .. }, Some(Expectation::Existed { step })) => *step == self.step,
            _ => false,
        };
        if resolved {
            self.expected.remove(key);
        }
    }

    fn finish_round(&mut self) -> Result<RoundOutcome, Violation> {
        if !self.expected.is_empty() {
            return Err(Violation::Unresolved {
                writer: self.writer,
                count: self.expected.len(),
                step: self.step,
            });
        }

        let steps = self.step;
        self.step = 0;
        self.rounds += 1;
        self.generator.reset();
        Ok(RoundOutcome::Finished { steps })
    }

    fn stale(&self, key: &[u8], observed: u64) -> Violation {
        Violation::StaleRead {
            writer: self.writer,
            key: render(key),
            observed,
            verifying: self.step,
        }
    }
}

fn render(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITER: u64 = 3;
    const SEED: u64 = 0x5eed;

    fn config() -> GeneratorConfig {
        // Short keys so the stream revisits keys often.
        GeneratorConfig {
            key_len: 1..2,
            value_len: 4..8,
        }
    }

    /// Apply `steps` operations of the writer's stream to a map, skipping
    /// the put at `lose_put` if given.
    fn write_history(steps: u64, lose_put: Option<u64>) -> HashMap<Vec<u8>, Vec<u8>> {
        let mut gen = Generator::new(SEED, config());
        let mut store = HashMap::new();
        for step in 1..=steps {
            match gen.next_op() {
                Op::Put { key, value } => {
                    if lose_put != Some(step) {
                        store.insert(key, Value::new(WRITER, step, value).encode());
                    }
                }
                Op::Delete { key } => {
                    store.remove(&key);
                }
            }
        }
        store
    }

    fn verify_round(
        tracker: &mut Tracker,
        store: &HashMap<Vec<u8>, Vec<u8>>,
        published: u64,
    ) -> Result<u64, Violation> {
        loop {
            match tracker.advance(published)? {
                RoundOutcome::Finished { steps } => return Ok(steps),
                RoundOutcome::Pending(op) => {
                    tracker.observe(&op, store.get(op.key()).map(Vec::as_slice))?
                }
            }
        }
    }

    /// First step at which the stream issues a put that survives to `steps`.
    fn surviving_put(steps: u64) -> u64 {
        let store = write_history(steps, None);
        store
            .values()
            .map(|bytes| Value::decode(bytes).unwrap().step())
            .min()
            .expect("history has at least one surviving put")
    }

    #[test]
    fn consistent_history_finishes_round() {
        let store = write_history(200, None);
        let mut tracker = Tracker::new(WRITER, SEED, config());

        let steps = verify_round(&mut tracker, &store, 200).unwrap();
        assert_eq!(steps, 200);
        assert_eq!(tracker.rounds(), 1);
        assert_eq!(tracker.step(), 0);
        assert!(tracker.expected().is_empty());
    }

    #[test]
    fn rounds_repeat_after_reset() {
        let store = write_history(50, None);
        let mut tracker = Tracker::new(WRITER, SEED, config());

        verify_round(&mut tracker, &store, 50).unwrap();
        verify_round(&mut tracker, &store, 50).unwrap();
        assert_eq!(tracker.rounds(), 2);
    }

    #[test]
    fn nothing_published_finishes_immediately() {
        let mut tracker = Tracker::new(WRITER, SEED, config());
        assert_eq!(
            tracker.advance(0).unwrap(),
            RoundOutcome::Finished { steps: 0 }
        );
    }

    #[test]
    fn lost_put_is_detected() {
        let steps = 200;
        let lost = surviving_put(steps);
        let store = write_history(steps, Some(lost));
        let mut tracker = Tracker::new(WRITER, SEED, config());

        let err = verify_round(&mut tracker, &store, steps).unwrap_err();
        assert!(
            matches!(
                err,
                Violation::Unresolved { .. } | Violation::StaleRead { .. }
            ),
            "unexpected violation: {err:?}"
        );
    }

    #[test]
    fn stale_value_is_detected() {
        let mut tracker = Tracker::new(WRITER, SEED, config());
        // Skip ahead to the second step, then claim the key holds step 1.
        let op = loop {
            match tracker.advance(10).unwrap() {
                RoundOutcome::Pending(op) if tracker.step() >= 2 => break op,
                RoundOutcome::Pending(_) => continue,
                RoundOutcome::Finished { .. } => unreachable!(),
            }
        };
        let old = Value::new(WRITER, 1, b"old".to_vec()).encode();

        let err = tracker.observe(&op, Some(&old)).unwrap_err();
        assert!(matches!(err, Violation::StaleRead { observed: 1, verifying: 2, .. }));
    }

    #[test]
    fn mismatched_payload_is_detected() {
        let mut tracker = Tracker::new(WRITER, SEED, config());
        let op = loop {
            match tracker.advance(1000).unwrap() {
                RoundOutcome::Pending(op @ Op::Put { .. }) => break op,
                RoundOutcome::Pending(_) => continue,
                RoundOutcome::Finished { .. } => unreachable!(),
            }
        };
        let forged = Value::new(WRITER, tracker.step(), b"forged-payload".to_vec()).encode();

        let err = tracker.observe(&op, Some(&forged)).unwrap_err();
        assert!(matches!(err, Violation::ValueMismatch { .. }));
    }

    #[test]
    fn newer_value_records_expectation() {
        let mut tracker = Tracker::new(WRITER, SEED, config());
        let RoundOutcome::Pending(op) = tracker.advance(10).unwrap() else {
            panic!("expected a pending op");
        };
        let newer = Value::new(WRITER, 9, b"newer".to_vec()).encode();

        tracker.observe(&op, Some(&newer)).unwrap();
        assert_eq!(
            tracker.expected().get(op.key()),
            Some(&Expectation::Existed { step: 9 })
        );
    }

    #[test]
    fn foreign_writer_value_is_ignored() {
        let mut tracker = Tracker::new(WRITER, SEED, config());
        let RoundOutcome::Pending(op) = tracker.advance(10).unwrap() else {
            panic!("expected a pending op");
        };
        let foreign = Value::new(WRITER + 1, 0, b"x".to_vec()).encode();

        tracker.observe(&op, Some(&foreign)).unwrap();
        assert!(tracker.expected().is_empty());
    }

    #[test]
    fn malformed_value_is_reported() {
        let mut tracker = Tracker::new(WRITER, SEED, config());
        let RoundOutcome::Pending(op) = tracker.advance(10).unwrap() else {
            panic!("expected a pending op");
        };

        let err = tracker.observe(&op, Some(b"short")).unwrap_err();
        assert!(matches!(err, Violation::Malformed { .. }));
    }
}
