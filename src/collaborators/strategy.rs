//! Strategy adapter contract (trading, real estate) and reference desks.
//!
//! An adapter turns a capital allotment into a [`PositionChange`]. The
//! kernel moves the capital delta through the ledger; the position itself
//! stays on the company's books.

use crate::collaborators::MarketFeed;
use crate::error::KernelResult;
use crate::types::{Amount, CompanyId, PositionChange, Venue};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait StrategyAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// Proposed position for up to `available` capital, or `None` for no
    /// action.
    async fn propose_position(
        &self,
        company: CompanyId,
        available: Amount,
    ) -> KernelResult<Option<PositionChange>>;

    /// Proposed unwind of `exposure` already on the books.
    async fn propose_exit(
        &self,
        _company: CompanyId,
        _exposure: Amount,
    ) -> KernelResult<Option<PositionChange>> {
        Ok(None)
    }
}

/// Round-trip trading desk: commits a slice of capital and realizes the
/// result within the tick, scaled by the feed's `trading` signal.
pub struct TradingDesk {
    feed: Arc<MarketFeed>,
    allocation_bps: i64,
    max_return_bps: i64,
}

impl TradingDesk {
    pub fn new(feed: Arc<MarketFeed>, allocation_bps: i64, max_return_bps: i64) -> Self {
        Self {
            feed,
            allocation_bps,
            max_return_bps,
        }
    }
}

#[async_trait]
impl StrategyAdapter for TradingDesk {
    fn venue(&self) -> Venue {
        Venue::Trading
    }

    async fn propose_position(
        &self,
        _company: CompanyId,
        available: Amount,
    ) -> KernelResult<Option<PositionChange>> {
        let allotment = available.scale_bps(self.allocation_bps);
        if !allotment.is_positive() {
            return Ok(None);
        }

        // Signal 0.5 is flat; 1.0 earns the full return, 0.0 loses it.
        let signal = self.feed.signal("trading");
        let return_bps = ((signal - 0.5) * 2.0 * self.max_return_bps as f64).round() as i64;
        let pnl = allotment.scale_bps(return_bps);
        if pnl.is_zero() {
            return Ok(None);
        }

        Ok(Some(PositionChange {
            venue: Venue::Trading,
            capital_delta: pnl,
            exposure_delta: Amount::ZERO,
        }))
    }
}

/// Buys property with a slice of capital and sells the whole holding at a
/// fixed appreciation.
pub struct PropertyDesk {
    purchase_bps: i64,
    appreciation_bps: i64,
    minimum_purchase: Amount,
}

impl PropertyDesk {
    pub fn new(purchase_bps: i64, appreciation_bps: i64, minimum_purchase: Amount) -> Self {
        Self {
            purchase_bps,
            appreciation_bps,
            minimum_purchase,
        }
    }
}

#[async_trait]
impl StrategyAdapter for PropertyDesk {
    fn venue(&self) -> Venue {
        Venue::RealEstate
    }

    async fn propose_position(
        &self,
        _company: CompanyId,
        available: Amount,
    ) -> KernelResult<Option<PositionChange>> {
        let price = available.scale_bps(self.purchase_bps);
        if price < self.minimum_purchase || !price.is_positive() {
            return Ok(None);
        }
        Ok(Some(PositionChange {
            venue: Venue::RealEstate,
            capital_delta: -price,
            exposure_delta: price,
        }))
    }

    async fn propose_exit(
        &self,
        _company: CompanyId,
        exposure: Amount,
    ) -> KernelResult<Option<PositionChange>> {
        if !exposure.is_positive() {
            return Ok(None);
        }
        let proceeds = exposure.scale_bps(10_000 + self.appreciation_bps);
        Ok(Some(PositionChange {
            venue: Venue::RealEstate,
            capital_delta: proceeds,
            exposure_delta: -exposure,
        }))
    }
}
