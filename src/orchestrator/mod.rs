//! The tick orchestrator.
//!
//! Each tick:
//! 1. snapshot every schedulable company before any loop runs,
//! 2. activate all decision loops concurrently on a bounded worker pool,
//!    each under its own deadline,
//! 3. promote clones whose first activation succeeded,
//! 4. apply the collected proposals one at a time in priority order
//!    (liquidations first, then property sales, trades, investments,
//!    replications, listings, bids),
//! 5. liquidate companies below the configured floor,
//! 6. verify ledger and registry integrity.
//!
//! A loop that errors, panics or overruns its deadline contributes nothing;
//! the other loops are unaffected. Only an integrity fault ends the tick
//! with an error.

mod apply;
pub mod report;
pub mod scheduler;
pub mod view;

pub use report::{Effect, ProposalOutcome, TickReport};
pub use scheduler::{RunSummary, Scheduler};
pub use view::{HolderBalance, PortfolioSnapshot, PortfolioView};

use crate::agent::{build_ceo, CompanySnapshot, DecisionLoop, Listing, MarketContext};
use crate::collaborators::{
    BookValuation, MarketFeed, PropertyDesk, StrategyAdapter, TradingDesk, ValuationService,
};
use crate::company::{CapTable, Company, CompanyRegistry, Holder, PositionBook};
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::ledger::Ledger;
use crate::mna::MnaEngine;
use crate::replication::Replicator;
use crate::types::{AccountId, Amount, CompanyId, HolderId, LifecycleState, OwnerId, Proposal};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// External collaborators wired into the kernel.
#[derive(Clone)]
pub struct Collaborators {
    pub trading: Arc<dyn StrategyAdapter>,
    pub real_estate: Arc<dyn StrategyAdapter>,
    pub valuation: Arc<dyn ValuationService>,
    pub feed: Arc<MarketFeed>,
}

impl Collaborators {
    /// Reference desks and book valuation, driven by a seeded feed.
    pub fn reference(
        config: &KernelConfig,
        ledger: &Arc<Ledger>,
        registry: &Arc<CompanyRegistry>,
    ) -> Self {
        let feed = Arc::new(MarketFeed::new(config.market_seed));
        Self {
            trading: Arc::new(TradingDesk::new(feed.clone(), 10_000, 1_000)),
            real_estate: Arc::new(PropertyDesk::new(5_000, 800, Amount::from_major(50_000))),
            valuation: Arc::new(BookValuation::new(ledger.clone(), registry.clone(), 10_000)),
            feed,
        }
    }
}

/// Result of one activation.
#[derive(Debug)]
enum Activation {
    Completed(Vec<Proposal>),
    Failed(String),
    TimedOut,
}

pub struct Orchestrator {
    config: KernelConfig,
    ledger: Arc<Ledger>,
    registry: Arc<CompanyRegistry>,
    replicator: Replicator,
    mna: MnaEngine,
    collaborators: Collaborators,
    loops: Mutex<BTreeMap<CompanyId, Arc<dyn DecisionLoop>>>,
    workers: Arc<Semaphore>,
    tick: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        config: KernelConfig,
        ledger: Arc<Ledger>,
        registry: Arc<CompanyRegistry>,
        collaborators: Collaborators,
    ) -> Self {
        let replicator = Replicator::new(ledger.clone(), registry.clone(), &config);
        let mna = MnaEngine::new(
            ledger.clone(),
            registry.clone(),
            collaborators.valuation.clone(),
            &config,
        );
        let workers = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            config,
            ledger,
            registry,
            replicator,
            mna,
            collaborators,
            loops: Mutex::new(BTreeMap::new()),
            workers,
            tick: AtomicU64::new(0),
        }
    }

    /// Fresh ledger and registry with the reference collaborators.
    pub fn from_config(config: KernelConfig) -> Self {
        let ledger = Arc::new(Ledger::new());
        let registry = Arc::new(CompanyRegistry::new());
        let collaborators = Collaborators::reference(&config, &ledger, &registry);
        Self::new(config, ledger, registry, collaborators)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<CompanyRegistry> {
        &self.registry
    }

    pub fn replicator(&self) -> &Replicator {
        &self.replicator
    }

    pub fn mna(&self) -> &MnaEngine {
        &self.mna
    }

    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub fn view(&self) -> PortfolioView {
        PortfolioView::new(self.ledger.clone(), self.registry.clone())
    }

    /// Register an external stakeholder with `cash` recorded as an opening
    /// balance.
    pub async fn register_holder(&self, name: &str, cash: Amount) -> KernelResult<HolderId> {
        let id = self.registry.allocate_holder_id().await;
        let account = self.ledger.open_account(OwnerId::Holder(id), cash).await?;
        self.registry
            .insert_holder(Holder {
                id,
                name: name.to_string(),
                account,
            })
            .await;
        info!("Registered holder {} '{}' with {}", id, name, cash);
        Ok(id)
    }

    /// Found a company outside replication. It starts `Active` with
    /// `capital` recorded as an opening balance.
    pub async fn found_company(
        &self,
        name: &str,
        capital: Amount,
        cap_table: CapTable,
        ceo: Arc<dyn DecisionLoop>,
    ) -> KernelResult<CompanyId> {
        if !cap_table.is_complete() {
            return Err(KernelError::InvalidAmount(format!(
                "cap table for '{}' is incomplete",
                name
            )));
        }
        let slot = self.registry.reserve_slot(self.config.max_companies).await?;

        let id = self.registry.allocate_company_id().await;
        let account = self.ledger.open_account(OwnerId::Company(id), capital).await?;
        self.registry
            .insert_reserved(
                Company {
                    id,
                    name: name.to_string(),
                    state: LifecycleState::Active,
                    cap_table,
                    account,
                    style: ceo.style(),
                    parent: None,
                    founded_tick: self.current_tick(),
                    book: PositionBook::default(),
                    listed: false,
                },
                slot,
            )
            .await?;
        self.loops.lock().await.insert(id, ceo);
        Ok(id)
    }

    /// Found every company listed in the configuration, each wholly owned
    /// by its own founder.
    pub async fn bootstrap(&self) -> KernelResult<Vec<CompanyId>> {
        let mut founded = Vec::with_capacity(self.config.companies.len());
        for seed in self.config.companies.clone() {
            let founder = self
                .register_holder(&seed.founder, Amount::from_major_f64(seed.founder_cash))
                .await?;
            let id = self
                .found_company(
                    &seed.name,
                    Amount::from_major_f64(seed.capital),
                    CapTable::sole(OwnerId::Holder(founder)),
                    build_ceo(seed.style, format!("{} CEO", seed.name)),
                )
                .await?;
            founded.push(id);
        }
        Ok(founded)
    }

    /// Replace the decision loop driving `company`.
    pub async fn attach_loop(&self, company: CompanyId, ceo: Arc<dyn DecisionLoop>) -> KernelResult<()> {
        self.registry.state_of(company).await?;
        self.loops.lock().await.insert(company, ceo);
        Ok(())
    }

    pub async fn has_loop(&self, company: CompanyId) -> bool {
        self.loops.lock().await.contains_key(&company)
    }

    /// Run one scheduler tick.
    pub async fn tick(&self) -> KernelResult<TickReport> {
        if self.ledger.is_halted().await {
            return Err(KernelError::IntegrityFault("ledger is halted".into()));
        }

        let tick = self.tick.fetch_add(1, Ordering::SeqCst) + 1;
        self.collaborators.feed.advance(tick);
        let mut report = TickReport::new(tick);

        let (snapshots, market) = self.snapshot(tick).await?;
        let forming: BTreeSet<CompanyId> = snapshots
            .iter()
            .filter(|s| s.company.state == LifecycleState::Forming)
            .map(|s| s.id())
            .collect();

        let activations = self.activate_all(snapshots, &market).await;

        let mut proposals = Vec::new();
        for (company, activation) in activations {
            match activation {
                Activation::Completed(batch) => {
                    report.activated.push(company);
                    for proposal in batch {
                        if proposal.company() == company {
                            proposals.push(proposal);
                        } else {
                            warn!(
                                "Dropped {} from {}: it names {}",
                                proposal.id(),
                                company,
                                proposal.company()
                            );
                            report.dropped += 1;
                        }
                    }
                    if forming.contains(&company) {
                        match self
                            .registry
                            .transition(company, LifecycleState::Forming, LifecycleState::Active)
                            .await
                        {
                            Ok(()) => report.promoted.push(company),
                            Err(e) => debug!("{} not promoted: {}", company, e),
                        }
                    }
                }
                Activation::Failed(reason) => {
                    warn!("Decision loop of {} failed: {}", company, reason);
                    report.failed.push((company, reason));
                }
                Activation::TimedOut => {
                    warn!("Decision loop of {} missed its deadline", company);
                    report.timed_out.push(company);
                }
            }
        }

        // Stable sort: equal keys keep activation (company id) order.
        proposals.sort_by_key(|p| p.sort_key());

        for proposal in proposals {
            let result = self.apply(&proposal, tick).await;
            match &result {
                Ok(effect) => debug!("{} {} applied: {}", proposal.company(), proposal.kind(), effect),
                Err(e) if e.is_fatal() => {
                    error!("Integrity fault while applying {}: {}", proposal.id(), e);
                    return Err(e.clone());
                }
                Err(e) => info!("{} {} rejected: {}", proposal.company(), proposal.kind(), e),
            }
            report.outcomes.push(ProposalOutcome {
                proposal: proposal.id(),
                company: proposal.company(),
                kind: proposal.kind(),
                result,
            });
        }

        report.liquidated = self.enforce_liquidation_floor().await?;
        self.prune_loops().await;

        self.ledger.verify().await?;
        self.registry.verify_stakes().await?;

        info!(
            "Tick {}: {} activated, {} failed, {} timed out, {} applied, {} rejected",
            tick,
            report.activated.len(),
            report.failed.len(),
            report.timed_out.len(),
            report.applied(),
            report.rejected()
        );
        Ok(report)
    }

    /// Immutable inputs for every loop in this tick, read before any of
    /// them runs.
    async fn snapshot(&self, tick: u64) -> KernelResult<(Vec<CompanySnapshot>, MarketContext)> {
        let companies = self.registry.schedulable().await;
        let account_ids: Vec<AccountId> = companies.iter().map(|c| c.account).collect();
        let accounts = self.ledger.accounts(&account_ids).await?;

        let listings = companies
            .iter()
            .zip(&accounts)
            .filter(|(c, _)| c.listed && c.state == LifecycleState::Active)
            .map(|(c, a)| Listing {
                company: c.id,
                name: c.name.clone(),
                balance: a.balance,
            })
            .collect();

        let market = MarketContext {
            tick,
            signals: self.collaborators.feed.signals(),
            listings,
            trading: self.collaborators.trading.clone(),
            real_estate: self.collaborators.real_estate.clone(),
            valuation: self.collaborators.valuation.clone(),
        };

        let mut snapshots = Vec::with_capacity(companies.len());
        for (company, account) in companies.into_iter().zip(accounts) {
            let holdings = self.registry.holdings_of(OwnerId::Company(company.id)).await;
            snapshots.push(CompanySnapshot {
                tick,
                company,
                balance: account.balance,
                account_version: account.version,
                holdings,
                minimum_reserve: self.replicator.minimum_reserve(),
            });
        }
        Ok((snapshots, market))
    }

    async fn activate_all(
        &self,
        snapshots: Vec<CompanySnapshot>,
        market: &MarketContext,
    ) -> BTreeMap<CompanyId, Activation> {
        let loops = self.loops.lock().await.clone();
        let limit = self.config.decision_loop_timeout();
        let mut set = JoinSet::new();

        for snapshot in snapshots {
            let id = snapshot.id();
            let Some(ceo) = loops.get(&id).cloned() else {
                debug!("{} has no decision loop", id);
                continue;
            };
            let market = market.clone();
            let workers = self.workers.clone();
            set.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return (id, Activation::Failed("worker pool closed".into()));
                };
                (id, activate_one(ceo, snapshot, market, limit).await)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, activation)) => {
                    results.insert(id, activation);
                }
                Err(e) => error!("Activation task lost: {}", e),
            }
        }
        results
    }

    /// Liquidate every active company whose net worth (cash plus booked
    /// exposure) is below the configured floor.
    async fn enforce_liquidation_floor(&self) -> KernelResult<Vec<CompanyId>> {
        let floor = self.config.liquidation_floor();
        if !floor.is_positive() {
            return Ok(Vec::new());
        }

        let mut liquidated = Vec::new();
        for company in self.registry.list().await {
            if company.state != LifecycleState::Active {
                continue;
            }
            let balance = self.ledger.balance(company.account).await?;
            if balance + company.book.total() >= floor {
                continue;
            }
            warn!(
                "{} is worth {} against a floor of {}, liquidating",
                company.id,
                balance + company.book.total(),
                floor
            );
            match self.liquidate(company.id, None).await {
                Ok(_) => liquidated.push(company.id),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Could not liquidate {}: {}", company.id, e),
            }
        }
        Ok(liquidated)
    }

    /// Drop loops of companies that reached a terminal state.
    async fn prune_loops(&self) {
        let terminal: Vec<CompanyId> = self
            .registry
            .list()
            .await
            .into_iter()
            .filter(|c| c.state.is_terminal())
            .map(|c| c.id)
            .collect();
        let mut loops = self.loops.lock().await;
        for id in terminal {
            if loops.remove(&id).is_some() {
                info!("Deregistered decision loop of {}", id);
            }
        }
    }
}

/// Run one activation in its own task, so a panic is contained, and abort
/// it at the deadline.
async fn activate_one(
    ceo: Arc<dyn DecisionLoop>,
    snapshot: CompanySnapshot,
    market: MarketContext,
    limit: Duration,
) -> Activation {
    let mut handle = tokio::spawn(async move { ceo.activate(&snapshot, &market).await });
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(Ok(proposals))) => Activation::Completed(proposals),
        Ok(Ok(Err(e))) => Activation::Failed(format!("{:#}", e)),
        Ok(Err(e)) if e.is_panic() => Activation::Failed("decision loop panicked".into()),
        Ok(Err(e)) => Activation::Failed(e.to_string()),
        Err(_) => {
            handle.abort();
            Activation::TimedOut
        }
    }
}
