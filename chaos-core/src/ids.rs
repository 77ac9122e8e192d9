//! Identity types for cluster members.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// A cluster server identifier as understood by `bootstrap.sh`.
///
/// Servers are numbered from 1; zero never names a server.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ServerId(NonZeroU32);

impl ServerId {
    /// Create a ServerId, returning `None` for zero.
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Get the numeric id.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// All server ids of a cluster with `count` members, in order.
    pub fn all(count: u32) -> impl Iterator<Item = ServerId> {
        (1..=count).filter_map(ServerId::new)
    }
}

impl TryFrom<u32> for ServerId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        ServerId::new(value).ok_or_else(|| "server id must be at least 1".to_string())
    }
}

impl From<ServerId> for u32 {
    fn from(id: ServerId) -> Self {
        id.get()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_server() {
        assert!(ServerId::new(0).is_none());
        assert_eq!(ServerId::new(3).unwrap().get(), 3);
    }

    #[test]
    fn all_enumerates_from_one() {
        let ids: Vec<u32> = ServerId::all(3).map(|id| id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ServerId::all(0).count(), 0);
    }

    #[test]
    fn display_is_bare_number() {
        // bootstrap.sh takes the id as a plain argument
        assert_eq!(ServerId::new(7).unwrap().to_string(), "7");
    }
}
