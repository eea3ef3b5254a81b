//! Deterministic market signal feed.
//!
//! Signals are a pure function of `(seed, tick)`, so a run replays exactly
//! and concurrent readers need no lock.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sector names in generation order.
pub const SECTORS: &[&str] = &["trading", "real_estate", "saas", "fintech", "ai_services"];

/// Sector -> signal strength in `[0, 1]`.
pub type MarketSignals = BTreeMap<String, f64>;

#[derive(Debug)]
pub struct MarketFeed {
    seed: u64,
    tick: AtomicU64,
}

impl MarketFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, tick: u64) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> MarketSignals {
        self.signals_at(self.tick())
    }

    pub fn signals_at(&self, tick: u64) -> MarketSignals {
        let mut rng = StdRng::seed_from_u64(self.seed ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        SECTORS
            .iter()
            .map(|sector| (sector.to_string(), rng.gen_range(0.0..=1.0)))
            .collect()
    }

    /// Current signal for one sector; 0.5 (neutral) for unknown sectors.
    pub fn signal(&self, sector: &str) -> f64 {
        self.signals().get(sector).copied().unwrap_or(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_and_tick_give_same_signals() {
        let a = MarketFeed::new(42);
        let b = MarketFeed::new(42);
        a.advance(7);
        b.advance(7);
        assert_eq!(a.signals(), b.signals());
        assert_eq!(a.signals().len(), SECTORS.len());
        assert!(a.signals().values().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_unknown_sector_is_neutral() {
        assert_eq!(MarketFeed::new(1).signal("shipping"), 0.5);
    }
}
