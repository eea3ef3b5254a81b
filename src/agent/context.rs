//! Activation inputs: the company snapshot and the market context.

use crate::collaborators::{MarketSignals, StrategyAdapter, ValuationService};
use crate::company::Company;
use crate::types::{Amount, CompanyId, Fraction};
use std::sync::Arc;

/// Immutable copy of a company and its account, taken before any loop in
/// the tick runs. Writes made during the tick are never visible through it.
#[derive(Debug, Clone)]
pub struct CompanySnapshot {
    pub tick: u64,
    pub company: Company,
    pub balance: Amount,
    pub account_version: u64,
    /// Stakes this company's treasury holds in other companies.
    pub holdings: Vec<(CompanyId, Fraction)>,
    pub minimum_reserve: Amount,
}

impl CompanySnapshot {
    pub fn id(&self) -> CompanyId {
        self.company.id
    }

    /// Balance above the replication reserve, never negative.
    pub fn free_capital(&self) -> Amount {
        (self.balance - self.minimum_reserve).max(Amount::ZERO)
    }
}

/// A company open to acquisition offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub company: CompanyId,
    pub name: String,
    pub balance: Amount,
}

/// Shared, read-only view of the market for one tick.
#[derive(Clone)]
pub struct MarketContext {
    pub tick: u64,
    pub signals: MarketSignals,
    pub listings: Vec<Listing>,
    pub trading: Arc<dyn StrategyAdapter>,
    pub real_estate: Arc<dyn StrategyAdapter>,
    pub valuation: Arc<dyn ValuationService>,
}

impl MarketContext {
    /// Listings other than `company` itself.
    pub fn listings_excluding(&self, company: CompanyId) -> impl Iterator<Item = &Listing> + '_ {
        self.listings.iter().filter(move |l| l.company != company)
    }
}
