//! Process-wide persisted counters for durable id assignment.
//!
//! Counters are keyed by name so unrelated subsystems can share one store.
//! The store is a plain serde value: the host loads it at startup and saves
//! it with the rest of the world data. All access happens on the tick
//! thread, so `next` needs no synchronization; a multi-threaded host would
//! swap this for an atomic per key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monotone, persisted counters keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCounters {
    counters: BTreeMap<String, i32>,
}

impl GlobalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next value for `key`, starting at 0. Each call advances the
    /// counter; values are never reused.
    pub fn next(&mut self, key: &str) -> i32 {
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        let value = *counter;
        *counter += 1;
        value
    }

    /// The value the next call to [`next`](Self::next) would return.
    pub fn peek(&self, key: &str) -> i32 {
        self.counters.get(key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_advance() {
        let mut counters = GlobalCounters::new();
        assert_eq!(counters.next("part"), 0);
        assert_eq!(counters.next("part"), 1);
        assert_eq!(counters.next("part"), 2);
    }

    #[test]
    fn keys_are_independent() {
        let mut counters = GlobalCounters::new();
        assert_eq!(counters.next("part"), 0);
        assert_eq!(counters.next("variable"), 0);
        assert_eq!(counters.next("part"), 1);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut counters = GlobalCounters::new();
        counters.next("part");
        assert_eq!(counters.peek("part"), 1);
        assert_eq!(counters.peek("part"), 1);
    }

    #[test]
    fn survives_a_serde_round_trip() {
        let mut counters = GlobalCounters::new();
        counters.next("part");
        counters.next("part");
        let blob = bitcode::serialize(&counters).unwrap();
        let mut restored: GlobalCounters = bitcode::deserialize(&blob).unwrap();
        assert_eq!(restored, counters);
        assert_eq!(restored.next("part"), 2);
    }
}
