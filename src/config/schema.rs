//! Configuration schema for holdco.toml.
//!
//! Money values are major currency units in the file and fixed point
//! everywhere else; use the accessor methods rather than the raw fields.

use crate::types::{Amount, CeoStyle, Fraction};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest premium accepted (100 = pay 101x the target's valuation).
pub const MAX_SYNERGY_PREMIUM: f64 = 100.0;

/// Largest money value accepted in the file, in major units. Leaves room
/// for sums over many accounts without overflowing fixed point.
pub const MAX_CONFIG_AMOUNT: f64 = 1e12;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Human-readable portfolio name.
    pub name: String,

    /// Balance a company must keep after funding a clone.
    pub minimum_reserve: f64,

    /// Stake the parent's treasury keeps in each clone, in (0, 1].
    pub parent_retained_stake: f64,

    /// Premium over the target's valuation paid in acquisitions (0.2 = 20%).
    pub synergy_premium: f64,

    /// Deadline for one decision-loop activation.
    pub decision_loop_timeout_ms: u64,

    /// Deadline for one valuation call.
    pub valuation_timeout_ms: u64,

    /// Pause between scheduler ticks.
    pub tick_interval_ms: u64,

    /// Stop after this many ticks (0 = run until cancelled).
    pub max_ticks: u64,

    /// Upper bound on live companies; replication is refused beyond it.
    pub max_companies: usize,

    /// Concurrent activations allowed at once.
    pub worker_pool_size: usize,

    /// Companies whose net worth is below this at tick end are liquidated
    /// (0 = off).
    pub liquidation_floor: f64,

    /// Seed for the market signal feed.
    pub market_seed: u64,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Companies founded at startup.
    pub companies: Vec<SeedCompany>,
}

/// A company created at bootstrap, wholly owned by one founder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedCompany {
    pub name: String,
    pub capital: f64,
    pub founder: String,
    /// Founder's own starting cash.
    pub founder_cash: f64,
    pub style: CeoStyle,
}

impl Default for SeedCompany {
    fn default() -> Self {
        Self {
            name: String::new(),
            capital: 0.0,
            founder: "founder".into(),
            founder_cash: 0.0,
            style: CeoStyle::Conservative,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "holdco".into(),
            minimum_reserve: 100_000.0,
            parent_retained_stake: 0.6,
            synergy_premium: 0.2,
            decision_loop_timeout_ms: 2_000,
            valuation_timeout_ms: 1_000,
            tick_interval_ms: 1_000,
            max_ticks: 0,
            max_companies: 20,
            worker_pool_size: 8,
            liquidation_floor: 0.0,
            market_seed: 7,
            log_level: "info".into(),
            companies: vec![
                SeedCompany {
                    name: "Titan SaaS Alpha".into(),
                    capital: 2_000_000.0,
                    founder: "Alpha Founders".into(),
                    founder_cash: 0.0,
                    style: CeoStyle::Conservative,
                },
                SeedCompany {
                    name: "Titan FinTech".into(),
                    capital: 3_000_000.0,
                    founder: "FinTech Founders".into(),
                    founder_cash: 0.0,
                    style: CeoStyle::Aggressive,
                },
                SeedCompany {
                    name: "Titan Realty".into(),
                    capital: 5_000_000.0,
                    founder: "Realty Founders".into(),
                    founder_cash: 0.0,
                    style: CeoStyle::Specialist,
                },
            ],
        }
    }
}

impl KernelConfig {
    pub fn minimum_reserve(&self) -> Amount {
        Amount::from_major_f64(self.minimum_reserve)
    }

    pub fn liquidation_floor(&self) -> Amount {
        Amount::from_major_f64(self.liquidation_floor)
    }

    pub fn parent_retained_stake(&self) -> Fraction {
        Fraction::from_f64(self.parent_retained_stake).unwrap_or(Fraction::ONE)
    }

    /// Acquisition price multiplier in basis points (premium 0.2 -> 12_000).
    pub fn price_multiplier_bps(&self) -> i64 {
        let premium_bps = (self.synergy_premium * 10_000.0).round() as i64;
        10_000i64.saturating_add(premium_bps).max(0)
    }

    pub fn decision_loop_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_loop_timeout_ms)
    }

    pub fn valuation_timeout(&self) -> Duration {
        Duration::from_millis(self.valuation_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values the kernel cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.parent_retained_stake > 0.0 && self.parent_retained_stake <= 1.0) {
            bail!(
                "parent_retained_stake must be in (0, 1], got {}",
                self.parent_retained_stake
            );
        }
        if !self.synergy_premium.is_finite()
            || self.synergy_premium <= -1.0
            || self.synergy_premium > MAX_SYNERGY_PREMIUM
        {
            bail!(
                "synergy_premium must be in (-1, {}], got {}",
                MAX_SYNERGY_PREMIUM,
                self.synergy_premium
            );
        }
        check_amount("minimum_reserve", self.minimum_reserve)?;
        check_amount("liquidation_floor", self.liquidation_floor)?;
        if self.decision_loop_timeout_ms == 0 || self.valuation_timeout_ms == 0 {
            bail!("timeouts must be positive");
        }
        if self.worker_pool_size == 0 {
            bail!("worker_pool_size must be at least 1");
        }
        for company in &self.companies {
            if company.name.is_empty() {
                bail!("seed company without a name");
            }
            check_amount(&format!("capital of '{}'", company.name), company.capital)?;
            check_amount(
                &format!("founder_cash of '{}'", company.name),
                company.founder_cash,
            )?;
        }
        Ok(())
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_CONFIG_AMOUNT).contains(&value) {
        bail!("{} must be in [0, {}], got {}", field, MAX_CONFIG_AMOUNT, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KernelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.minimum_reserve(), Amount::from_major(100_000));
        assert_eq!(config.price_multiplier_bps(), 12_000);
        assert_eq!(config.parent_retained_stake(), Fraction::from_f64(0.6).unwrap());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: KernelConfig = toml::from_str(
            r#"
            minimum_reserve = 50000.0
            synergy_premium = 0.0

            [[companies]]
            name = "Solo"
            capital = 1000.0
            style = "aggressive"
            "#,
        )
        .unwrap();

        assert_eq!(config.minimum_reserve(), Amount::from_major(50_000));
        assert_eq!(config.price_multiplier_bps(), 10_000);
        assert_eq!(config.worker_pool_size, 8);
        assert_eq!(config.companies.len(), 1);
        assert_eq!(config.companies[0].style, CeoStyle::Aggressive);
        assert_eq!(config.companies[0].founder, "founder");
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut config = KernelConfig {
            parent_retained_stake: 0.0,
            ..KernelConfig::default()
        };
        assert!(config.validate().is_err());

        config.parent_retained_stake = 0.5;
        config.synergy_premium = -1.0;
        assert!(config.validate().is_err());

        config.synergy_premium = 0.1;
        config.worker_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_premium_is_rejected_and_never_overflows() {
        let config = KernelConfig {
            synergy_premium: 1e20,
            ..KernelConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.price_multiplier_bps(), i64::MAX);

        let config = KernelConfig {
            synergy_premium: f64::NAN,
            ..KernelConfig::default()
        };
        assert!(config.validate().is_err());

        let config = KernelConfig {
            synergy_premium: MAX_SYNERGY_PREMIUM,
            ..KernelConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.price_multiplier_bps(), 1_010_000);
    }

    #[test]
    fn test_money_fields_must_be_finite_and_bounded() {
        let cases = [
            KernelConfig {
                minimum_reserve: f64::NAN,
                ..KernelConfig::default()
            },
            KernelConfig {
                minimum_reserve: 1e18,
                ..KernelConfig::default()
            },
            KernelConfig {
                liquidation_floor: f64::INFINITY,
                ..KernelConfig::default()
            },
            KernelConfig {
                liquidation_floor: -1.0,
                ..KernelConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err());
        }

        let mut config = KernelConfig::default();
        config.companies[0].capital = f64::NAN;
        assert!(config.validate().is_err());
        config.companies[0].capital = MAX_CONFIG_AMOUNT * 10.0;
        assert!(config.validate().is_err());
        config.companies[0].capital = 1_000.0;
        config.companies[1].founder_cash = f64::NEG_INFINITY;
        assert!(config.validate().is_err());
        config.companies[1].founder_cash = MAX_CONFIG_AMOUNT;
        config.validate().unwrap();
    }
}
