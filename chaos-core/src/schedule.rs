//! Randomized restart schedule.
//!
//! Each [`Round`] names one server to stop, how long it stays down, and how
//! long the cluster gets to settle after the restart before health is
//! checked. The schedule is driven by a seeded RNG so a failing run can be
//! replayed with the seed it logged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ids::ServerId;

/// Wait bounds for a round, in milliseconds (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Shortest time a server stays stopped.
    #[serde(default = "default_down_min_ms")]
    pub down_min_ms: u64,
    /// Longest time a server stays stopped.
    #[serde(default = "default_down_max_ms")]
    pub down_max_ms: u64,
    /// Shortest wait between restart and health check.
    #[serde(default = "default_settle_min_ms")]
    pub settle_min_ms: u64,
    /// Longest wait between restart and health check.
    #[serde(default = "default_settle_max_ms")]
    pub settle_max_ms: u64,
}

fn default_down_min_ms() -> u64 {
    5_000
}

fn default_down_max_ms() -> u64 {
    30_000
}

fn default_settle_min_ms() -> u64 {
    10_000
}

fn default_settle_max_ms() -> u64 {
    30_000
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            down_min_ms: default_down_min_ms(),
            down_max_ms: default_down_max_ms(),
            settle_min_ms: default_settle_min_ms(),
            settle_max_ms: default_settle_max_ms(),
        }
    }
}

impl Timing {
    /// Check that every lower bound is within its upper bound.
    pub fn validate(&self) -> Result<(), String> {
        if self.down_min_ms > self.down_max_ms {
            return Err(format!(
                "down_min_ms ({}) exceeds down_max_ms ({})",
                self.down_min_ms, self.down_max_ms
            ));
        }
        if self.settle_min_ms > self.settle_max_ms {
            return Err(format!(
                "settle_min_ms ({}) exceeds settle_max_ms ({})",
                self.settle_min_ms, self.settle_max_ms
            ));
        }
        Ok(())
    }
}

/// One stop/start cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    /// 1-based round number.
    pub number: u64,
    /// Server to stop and restart.
    pub server: ServerId,
    /// How long the server stays stopped.
    pub downtime: Duration,
    /// Wait after restart before the health check.
    pub settle: Duration,
}

/// Seeded generator of restart rounds.
#[derive(Debug)]
pub struct Schedule {
    servers: u32,
    timing: Timing,
    seed: u64,
    rng: StdRng,
    issued: u64,
}

impl Schedule {
    /// Create a schedule over servers `1..=servers`.
    ///
    /// `servers` must be at least 1 and `timing` must pass [`Timing::validate`].
    pub fn new(servers: u32, timing: Timing, seed: u64) -> Self {
        Self {
            servers,
            timing,
            seed,
            rng: StdRng::seed_from_u64(seed),
            issued: 0,
        }
    }

    /// The seed to replay this schedule.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of rounds handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Pick the next round.
    pub fn next_round(&mut self) -> Round {
        let id = self.rng.gen_range(1..=self.servers.max(1));
        let server = ServerId::new(id).unwrap_or_else(|| unreachable!("range starts at 1"));
        let downtime = self.pick(self.timing.down_min_ms, self.timing.down_max_ms);
        let settle = self.pick(self.timing.settle_min_ms, self.timing.settle_max_ms);
        self.issued += 1;
        Round {
            number: self.issued,
            server,
            downtime,
            settle,
        }
    }

    fn pick(&mut self, min: u64, max: u64) -> Duration {
        Duration::from_millis(self.rng.gen_range(min..=max.max(min)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> Timing {
        Timing {
            down_min_ms: 100,
            down_max_ms: 200,
            settle_min_ms: 10,
            settle_max_ms: 20,
        }
    }

    #[test]
    fn rounds_stay_in_bounds() {
        let mut schedule = Schedule::new(5, timing(), 42);
        for _ in 0..500 {
            let round = schedule.next_round();
            assert!((1..=5).contains(&round.server.get()));
            assert!(round.downtime >= Duration::from_millis(100));
            assert!(round.downtime <= Duration::from_millis(200));
            assert!(round.settle >= Duration::from_millis(10));
            assert!(round.settle <= Duration::from_millis(20));
        }
    }

    #[test]
    fn every_server_gets_picked() {
        let mut schedule = Schedule::new(3, timing(), 1);
        let mut seen = [false; 3];
        for _ in 0..100 {
            seen[schedule.next_round().server.get() as usize - 1] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn same_seed_same_rounds() {
        let mut a = Schedule::new(4, timing(), 1234);
        let mut b = Schedule::new(4, timing(), 1234);
        for _ in 0..50 {
            assert_eq!(a.next_round(), b.next_round());
        }
    }

    #[test]
    fn rounds_are_numbered() {
        let mut schedule = Schedule::new(1, timing(), 0);
        assert_eq!(schedule.next_round().number, 1);
        assert_eq!(schedule.next_round().number, 2);
        assert_eq!(schedule.issued(), 2);
    }

    #[test]
    fn fixed_timing_is_exact() {
        let fixed = Timing {
            down_min_ms: 50,
            down_max_ms: 50,
            settle_min_ms: 0,
            settle_max_ms: 0,
        };
        let round = Schedule::new(2, fixed, 9).next_round();
        assert_eq!(round.downtime, Duration::from_millis(50));
        assert_eq!(round.settle, Duration::ZERO);
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        assert!(timing().validate().is_ok());
        assert!(Timing::default().validate().is_ok());

        let mut bad = timing();
        bad.down_min_ms = 300;
        assert!(bad.validate().is_err());

        let mut bad = timing();
        bad.settle_max_ms = 5;
        assert!(bad.validate().is_err());
    }
}
