//! Seeded operation stream for workload writers.
//!
//! A writer and every reader tracing it build a [`Generator`] from the same
//! seed and config, so the reader can replay exactly the operations the
//! writer issued without any coordination beyond the writer's step counter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::Range;

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shape of generated keys and values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Key length range in bytes (end exclusive).
    pub key_len: Range<usize>,
    /// Value payload length range in bytes (end exclusive).
    pub value_len: Range<usize>,
}

impl GeneratorConfig {
    /// Check that both ranges can be sampled.
    pub fn validate(&self) -> Result<(), String> {
        if self.key_len.is_empty() || self.key_len.start == 0 {
            return Err(format!(
                "key_len must be a non-empty range of positive lengths, got {:?}",
                self.key_len
            ));
        }
        if self.value_len.is_empty() {
            return Err(format!(
                "value_len must be a non-empty range, got {:?}",
                self.value_len
            ));
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            key_len: 16..32,
            value_len: 512..2048,
        }
    }
}

/// A single workload operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Store `value` under `key`.
    Put {
        /// Target key.
        key: Vec<u8>,
        /// Untagged payload.
        value: Vec<u8>,
    },
    /// Remove `key`.
    Delete {
        /// Target key.
        key: Vec<u8>,
    },
}

impl Op {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Op::Put { key, .. } | Op::Delete { key } => key,
        }
    }
}

/// Deterministic put/delete generator.
#[derive(Debug, Clone)]
pub struct Generator {
    seed: u64,
    config: GeneratorConfig,
    rng: StdRng,
}

impl Generator {
    /// Create a generator for the given seed.
    ///
    /// `config` must pass [`GeneratorConfig::validate`].
    pub fn new(seed: u64, config: GeneratorConfig) -> Self {
        Self {
            seed,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The seed this generator was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The key/value shape.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Rewind to the first operation.
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Produce the next operation.
    pub fn next_op(&mut self) -> Op {
        if self.rng.gen_bool(0.5) {
            let key = self.next_bytes(self.config.key_len.clone());
            let value = self.next_bytes(self.config.value_len.clone());
            Op::Put { key, value }
        } else {
            Op::Delete {
                key: self.next_bytes(self.config.key_len.clone()),
            }
        }
    }

    fn next_bytes(&mut self, len: Range<usize>) -> Vec<u8> {
        let len = self.rng.gen_range(len);
        (0..len)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())])
            .collect()
    }
}
