//! Reference CEO styles.
//!
//! These are deliberately simple rule sets; the kernel treats them like any
//! other [`DecisionLoop`]. Adapter failures inside an activation degrade to
//! "no action" for that adapter.

use crate::agent::{CompanySnapshot, DecisionLoop, MarketAnalyzer, MarketContext, Recommendation, Trend};
use crate::types::{Amount, CeoStyle, Proposal, ProposalPayload};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Build the reference loop for a configured style.
pub fn build_ceo(style: CeoStyle, name: impl Into<String>) -> Arc<dyn DecisionLoop> {
    let name = name.into();
    match style {
        CeoStyle::Conservative => Arc::new(ConservativeCeo::new(name)),
        CeoStyle::Aggressive => Arc::new(AggressiveCeo::new(name)),
        CeoStyle::Specialist => Arc::new(SpecialistCeo::new(name)),
    }
}

async fn trade(snapshot: &CompanySnapshot, market: &MarketContext, available: Amount) -> Option<Proposal> {
    match market.trading.propose_position(snapshot.id(), available).await {
        Ok(Some(change)) => Some(Proposal::new(
            snapshot.id(),
            snapshot.tick,
            ProposalPayload::Trade { change },
        )),
        Ok(None) => None,
        Err(e) => {
            debug!("{} trading desk declined: {}", snapshot.id(), e);
            None
        }
    }
}

fn log_decisions(name: &str, snapshot: &CompanySnapshot, proposals: &[Proposal]) {
    for p in proposals {
        info!("{} decided: {} for {}", name, p.kind(), snapshot.company.name);
    }
}

// ---------------------------------------------------------------------------
// Conservative
// ---------------------------------------------------------------------------

/// Trades small, replicates only with a large cushion, looks for a buyer
/// when capital runs thin. Never acquires.
pub struct ConservativeCeo {
    name: String,
    analyzer: MarketAnalyzer,
}

impl ConservativeCeo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analyzer: MarketAnalyzer::default(),
        }
    }
}

#[async_trait]
impl DecisionLoop for ConservativeCeo {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> CeoStyle {
        CeoStyle::Conservative
    }

    async fn activate(
        &self,
        snapshot: &CompanySnapshot,
        market: &MarketContext,
    ) -> Result<Vec<Proposal>> {
        let mut proposals = Vec::new();
        let id = snapshot.id();
        let analysis = self.analyzer.analyze(&market.signals);

        if snapshot.balance < snapshot.minimum_reserve.scale_bps(5_000) {
            if !snapshot.company.listed {
                proposals.push(Proposal::new(id, snapshot.tick, ProposalPayload::SeekAcquirer));
            }
        } else {
            let free = snapshot.free_capital();
            if let Some(p) = trade(snapshot, market, free.scale_bps(2_000)).await {
                proposals.push(p);
            }
            if analysis.trend == Trend::Bullish
                && snapshot.balance >= snapshot.minimum_reserve.scale_bps(40_000)
            {
                proposals.push(Proposal::new(
                    id,
                    snapshot.tick,
                    ProposalPayload::Replicate {
                        seed: free.scale_bps(2_500),
                    },
                ));
            }
        }

        log_decisions(&self.name, snapshot, &proposals);
        Ok(proposals)
    }

    fn fork(&self) -> Arc<dyn DecisionLoop> {
        Arc::new(Self::new(format!("{} (clone)", self.name)))
    }
}

// ---------------------------------------------------------------------------
// Aggressive
// ---------------------------------------------------------------------------

/// Trades big, replicates on expansion signals, bids for listed companies
/// it can afford and buys property when the market leans bullish.
pub struct AggressiveCeo {
    name: String,
    analyzer: MarketAnalyzer,
}

impl AggressiveCeo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analyzer: MarketAnalyzer::new(0.55),
        }
    }
}

#[async_trait]
impl DecisionLoop for AggressiveCeo {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> CeoStyle {
        CeoStyle::Aggressive
    }

    async fn activate(
        &self,
        snapshot: &CompanySnapshot,
        market: &MarketContext,
    ) -> Result<Vec<Proposal>> {
        let mut proposals = Vec::new();
        let id = snapshot.id();
        let free = snapshot.free_capital();
        let analysis = self.analyzer.analyze(&market.signals);

        if let Some(p) = trade(snapshot, market, free.scale_bps(5_000)).await {
            proposals.push(p);
        }

        // One bid per tick, for the first listing the valuation says we can
        // afford.
        for listing in market.listings_excluding(id) {
            match market.valuation.estimate_value(listing.company).await {
                Ok(value) if value <= free => {
                    proposals.push(Proposal::new(
                        id,
                        snapshot.tick,
                        ProposalPayload::OfferAcquisition {
                            target: listing.company,
                        },
                    ));
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!("{} skipped {}: {}", self.name, listing.company, e),
            }
        }

        if analysis.recommendation == Recommendation::Expand
            && snapshot.balance >= snapshot.minimum_reserve.scale_bps(20_000)
        {
            proposals.push(Proposal::new(
                id,
                snapshot.tick,
                ProposalPayload::Replicate {
                    seed: free.scale_bps(4_000),
                },
            ));
        } else if analysis.trend == Trend::Bullish {
            match market.real_estate.propose_position(id, free.scale_bps(2_000)).await {
                Ok(Some(change)) => proposals.push(Proposal::new(
                    id,
                    snapshot.tick,
                    ProposalPayload::Invest { change },
                )),
                Ok(None) => {}
                Err(e) => debug!("{} property desk declined: {}", self.name, e),
            }
        }

        log_decisions(&self.name, snapshot, &proposals);
        Ok(proposals)
    }

    fn fork(&self) -> Arc<dyn DecisionLoop> {
        Arc::new(Self::new(format!("{} (clone)", self.name)))
    }
}

// ---------------------------------------------------------------------------
// Specialist (real estate)
// ---------------------------------------------------------------------------

/// Real-estate focused: buys on a strong property signal, sells on a weak
/// one, winds the company down once it holds nothing.
pub struct SpecialistCeo {
    name: String,
    buy_above: f64,
    sell_below: f64,
}

impl SpecialistCeo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buy_above: 0.6,
            sell_below: 0.3,
        }
    }
}

#[async_trait]
impl DecisionLoop for SpecialistCeo {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> CeoStyle {
        CeoStyle::Specialist
    }

    async fn activate(
        &self,
        snapshot: &CompanySnapshot,
        market: &MarketContext,
    ) -> Result<Vec<Proposal>> {
        let mut proposals = Vec::new();
        let id = snapshot.id();
        let exposure = snapshot.company.book.real_estate;
        let signal = market.signals.get("real_estate").copied().unwrap_or(0.5);

        if snapshot.balance.is_zero() && exposure.is_zero() {
            proposals.push(Proposal::new(id, snapshot.tick, ProposalPayload::Liquidate));
        } else if signal > self.buy_above {
            match market
                .real_estate
                .propose_position(id, snapshot.free_capital())
                .await
            {
                Ok(Some(change)) => proposals.push(Proposal::new(
                    id,
                    snapshot.tick,
                    ProposalPayload::Invest { change },
                )),
                Ok(None) => {}
                Err(e) => debug!("{} property desk declined: {}", self.name, e),
            }
        } else if signal < self.sell_below && exposure.is_positive() {
            match market.real_estate.propose_exit(id, exposure).await {
                Ok(Some(change)) => proposals.push(Proposal::new(
                    id,
                    snapshot.tick,
                    ProposalPayload::SellProperty { change },
                )),
                Ok(None) => {}
                Err(e) => debug!("{} property desk declined exit: {}", self.name, e),
            }
        }

        log_decisions(&self.name, snapshot, &proposals);
        Ok(proposals)
    }

    fn fork(&self) -> Arc<dyn DecisionLoop> {
        Arc::new(Self::new(format!("{} (clone)", self.name)))
    }
}
