#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use holdco::agent::{CompanySnapshot, DecisionLoop, MarketContext};
use holdco::collaborators::{MarketFeed, StaticValuation, StrategyAdapter};
use holdco::company::CapTable;
use holdco::config::KernelConfig;
use holdco::error::KernelResult;
use holdco::ledger::Ledger;
use holdco::orchestrator::{Collaborators, Orchestrator};
use holdco::company::CompanyRegistry;
use holdco::types::{
    Amount, CeoStyle, CompanyId, HolderId, OwnerId, PositionChange, Proposal, ProposalPayload,
    Venue,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn major(units: i64) -> Amount {
    Amount::from_major(units)
}

/// Quiet config: no seed companies, short deadlines, no premium.
pub fn config() -> KernelConfig {
    KernelConfig {
        companies: Vec::new(),
        minimum_reserve: 100_000.0,
        parent_retained_stake: 0.6,
        synergy_premium: 0.0,
        decision_loop_timeout_ms: 200,
        valuation_timeout_ms: 200,
        tick_interval_ms: 10,
        ..KernelConfig::default()
    }
}

/// Orchestrator over inert desks and a static valuation table.
pub fn kernel(config: KernelConfig) -> (Arc<Orchestrator>, Arc<StaticValuation>) {
    let ledger = Arc::new(Ledger::new());
    let registry = Arc::new(CompanyRegistry::new());
    let valuation = Arc::new(StaticValuation::new());
    let collaborators = Collaborators {
        trading: Arc::new(IdleDesk(Venue::Trading)),
        real_estate: Arc::new(IdleDesk(Venue::RealEstate)),
        valuation: valuation.clone(),
        feed: Arc::new(MarketFeed::new(1)),
    };
    (
        Arc::new(Orchestrator::new(config, ledger, registry, collaborators)),
        valuation,
    )
}

pub async fn holder(kernel: &Orchestrator, name: &str) -> HolderId {
    kernel.register_holder(name, Amount::ZERO).await.unwrap()
}

/// Found a company wholly owned by `owner`, driven by `ceo`.
pub async fn company(
    kernel: &Orchestrator,
    name: &str,
    capital: Amount,
    owner: HolderId,
    ceo: Arc<dyn DecisionLoop>,
) -> CompanyId {
    kernel
        .found_company(name, capital, CapTable::sole(OwnerId::Holder(owner)), ceo)
        .await
        .unwrap()
}

pub async fn cash(kernel: &Orchestrator, owner: OwnerId) -> Amount {
    let account = kernel.registry().account_of(owner).await.unwrap();
    kernel.ledger().balance(account).await.unwrap()
}

/// Capital conservation and equity completeness.
pub async fn assert_invariants(kernel: &Orchestrator) {
    assert_eq!(
        kernel.ledger().total_balance().await,
        kernel.ledger().boundary_net().await
    );
    kernel.ledger().verify().await.unwrap();
    kernel.registry().verify_stakes().await.unwrap();
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Desk that never proposes anything.
pub struct IdleDesk(pub Venue);

#[async_trait]
impl StrategyAdapter for IdleDesk {
    fn venue(&self) -> Venue {
        self.0
    }

    async fn propose_position(
        &self,
        _company: CompanyId,
        _available: Amount,
    ) -> KernelResult<Option<PositionChange>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Decision loops
// ---------------------------------------------------------------------------

/// Emits one pre-planned batch per activation, then nothing.
pub struct ScriptedCeo {
    name: String,
    plan: Mutex<VecDeque<Vec<ProposalPayload>>>,
}

impl ScriptedCeo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            plan: Mutex::new(VecDeque::new()),
        }
    }

    pub fn then(self, batch: Vec<ProposalPayload>) -> Self {
        self.plan.lock().unwrap().push_back(batch);
        self
    }

    pub fn quiet(name: &str) -> Arc<dyn DecisionLoop> {
        Arc::new(Self::new(name))
    }

    pub fn build(self) -> Arc<dyn DecisionLoop> {
        Arc::new(self)
    }
}

#[async_trait]
impl DecisionLoop for ScriptedCeo {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> CeoStyle {
        CeoStyle::Conservative
    }

    async fn activate(
        &self,
        snapshot: &CompanySnapshot,
        _market: &MarketContext,
    ) -> Result<Vec<Proposal>> {
        let batch = self.plan.lock().unwrap().pop_front().unwrap_or_default();
        Ok(batch
            .into_iter()
            .map(|payload| Proposal::new(snapshot.id(), snapshot.tick, payload))
            .collect())
    }

    fn fork(&self) -> Arc<dyn DecisionLoop> {
        ScriptedCeo::quiet(&format!("{} (clone)", self.name))
    }
}

/// Misbehaving loops for bulkhead tests.
pub enum Faulty {
    Errors,
    Panics,
    Hangs,
    /// Issues a proposal on behalf of another company.
    Forges(CompanyId),
}

pub struct FaultyCeo(pub Faulty);

impl FaultyCeo {
    pub fn build(fault: Faulty) -> Arc<dyn DecisionLoop> {
        Arc::new(Self(fault))
    }
}

#[async_trait]
impl DecisionLoop for FaultyCeo {
    fn name(&self) -> &str {
        "faulty"
    }

    fn style(&self) -> CeoStyle {
        CeoStyle::Aggressive
    }

    async fn activate(
        &self,
        snapshot: &CompanySnapshot,
        _market: &MarketContext,
    ) -> Result<Vec<Proposal>> {
        match &self.0 {
            Faulty::Errors => Err(anyhow!("model endpoint unreachable")),
            Faulty::Panics => panic!("decision loop bug"),
            Faulty::Hangs => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
            Faulty::Forges(victim) => Ok(vec![Proposal::new(
                *victim,
                snapshot.tick,
                ProposalPayload::Liquidate,
            )]),
        }
    }

    fn fork(&self) -> Arc<dyn DecisionLoop> {
        ScriptedCeo::quiet("faulty (clone)")
    }
}
