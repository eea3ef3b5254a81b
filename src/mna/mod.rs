//! Mergers and acquisitions.
//!
//! A deal locks its target (`Active -> MergeNegotiating`) the moment it is
//! proposed; a second bid for the same target fails fast with
//! `TargetLocked`. The deal then values both sides, prices the target and
//! settles in one ledger transaction: the acquirer pays, the target's
//! stakeholders are paid pro rata, and the target's equity passes to the
//! acquirer. Any failure rejects the deal and unlocks the target.

pub mod deal;
pub mod pricing;

pub use deal::{Deal, DealState};
pub use pricing::negotiate_price;

use crate::collaborators::{bounded, ValuationService};
use crate::company::CompanyRegistry;
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::ledger::{Ledger, Receipt, Transaction, TransactionKind};
use crate::types::{Amount, CompanyId, DealId, LifecycleState, ProposalId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct MnaEngine {
    ledger: Arc<Ledger>,
    registry: Arc<CompanyRegistry>,
    valuation: Arc<dyn ValuationService>,
    multiplier_bps: i64,
    valuation_timeout: Duration,
    deals: Mutex<BTreeMap<DealId, Deal>>,
    next_deal: AtomicU64,
}

impl MnaEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        registry: Arc<CompanyRegistry>,
        valuation: Arc<dyn ValuationService>,
        config: &KernelConfig,
    ) -> Self {
        Self {
            ledger,
            registry,
            valuation,
            multiplier_bps: config.price_multiplier_bps(),
            valuation_timeout: config.valuation_timeout(),
            deals: Mutex::new(BTreeMap::new()),
            next_deal: AtomicU64::new(0),
        }
    }

    /// Open a deal and lock the target.
    pub async fn propose_acquisition(
        &self,
        acquirer: CompanyId,
        target: CompanyId,
        cause: Option<ProposalId>,
    ) -> KernelResult<DealId> {
        if acquirer == target {
            return Err(KernelError::Rejected(format!("{} cannot acquire itself", acquirer)));
        }
        let acquirer_state = self.registry.state_of(acquirer).await?;
        if acquirer_state != LifecycleState::Active {
            return Err(KernelError::StaleProposal {
                company: acquirer,
                state: acquirer_state,
            });
        }

        self.registry
            .transition(target, LifecycleState::Active, LifecycleState::MergeNegotiating)
            .await?;
        let consensual = self.registry.get(target).await?.listed;

        let id = DealId(self.next_deal.fetch_add(1, Ordering::SeqCst) + 1);
        let deal = Deal::new(id, acquirer, target, consensual, cause);
        info!(
            "{} opened: {} bids for {}{}",
            id,
            acquirer,
            target,
            if consensual { " (listed)" } else { "" }
        );
        self.deals.lock().await.insert(id, deal);
        Ok(id)
    }

    /// Drive a proposed deal to settlement. On any failure the deal ends
    /// `Rejected`, the target is unlocked and the error is returned; there is
    /// no automatic retry.
    pub async fn run_deal(&self, id: DealId) -> KernelResult<Deal> {
        match self.drive(id).await {
            Ok(deal) => Ok(deal),
            Err(e) => {
                self.abandon(id, &e).await;
                Err(e)
            }
        }
    }

    /// Propose and run in one call.
    pub async fn acquire(
        &self,
        acquirer: CompanyId,
        target: CompanyId,
        cause: Option<ProposalId>,
    ) -> KernelResult<Deal> {
        let id = self.propose_acquisition(acquirer, target, cause).await?;
        self.run_deal(id).await
    }

    pub async fn deal(&self, id: DealId) -> Option<Deal> {
        self.deals.lock().await.get(&id).cloned()
    }

    pub async fn deals(&self) -> Vec<Deal> {
        self.deals.lock().await.values().cloned().collect()
    }

    async fn drive(&self, id: DealId) -> KernelResult<Deal> {
        let deal = self.advance(id, DealState::Valuing).await?;

        let (acquirer_value, target_value) = tokio::join!(
            bounded(
                self.valuation_timeout,
                "acquirer valuation",
                self.valuation.estimate_value(deal.acquirer)
            ),
            bounded(
                self.valuation_timeout,
                "target valuation",
                self.valuation.estimate_value(deal.target)
            ),
        );
        let (acquirer_value, target_value) = (acquirer_value?, target_value?);
        self.record(id, |d| {
            d.acquirer_value = Some(acquirer_value);
            d.target_value = Some(target_value);
        })
        .await?;

        self.advance(id, DealState::Negotiating).await?;
        let price = negotiate_price(acquirer_value, target_value, self.multiplier_bps)?;
        self.record(id, |d| d.price = Some(price)).await?;
        let deal = self.advance(id, DealState::Agreed).await?;

        let receipt = self.settle(&deal, price).await?;
        self.registry
            .complete_takeover(deal.target, deal.acquirer, deal.terminal_state())
            .await
            .map_err(|e| {
                KernelError::IntegrityFault(format!(
                    "{} paid but equity of {} not transferred: {}",
                    id, deal.target, e
                ))
            })?;
        self.record(id, |d| d.settlement = Some(receipt)).await?;
        let deal = self.advance(id, DealState::Settled).await?;

        info!(
            "{} settled: {} bought {} for {} ({})",
            id,
            deal.acquirer,
            deal.target,
            price,
            deal.terminal_state()
        );
        Ok(deal)
    }

    async fn settle(&self, deal: &Deal, price: Amount) -> KernelResult<Receipt> {
        let acquirer = self.registry.get(deal.acquirer).await?;
        if acquirer.state != LifecycleState::Active {
            return Err(KernelError::StaleProposal {
                company: acquirer.id,
                state: acquirer.state,
            });
        }
        let target = self.registry.get(deal.target).await?;
        if target.state != LifecycleState::MergeNegotiating {
            return Err(KernelError::StaleProposal {
                company: target.id,
                state: target.state,
            });
        }

        let payouts = target.cap_table.pro_rata(price);
        let mut accounts = Vec::with_capacity(payouts.len() + 1);
        accounts.push(acquirer.account);
        for (owner, _) in &payouts {
            accounts.push(self.registry.account_of(*owner).await?);
        }
        let snapshots = self.ledger.accounts(&accounts).await?;

        let mut builder = Transaction::builder(TransactionKind::Acquisition)
            .caused_by(deal.cause)
            .memo(format!("{}: {} acquires {}", deal.id, deal.acquirer, deal.target))
            .debit(&snapshots[0], price);
        for (snapshot, (_, amount)) in snapshots[1..].iter().zip(&payouts) {
            builder = builder.credit(snapshot, *amount);
        }
        self.ledger.submit(builder.build()).await
    }

    async fn abandon(&self, id: DealId, cause: &KernelError) {
        let target = {
            let mut deals = self.deals.lock().await;
            let Some(deal) = deals.get_mut(&id) else {
                return;
            };
            if !deal.state.is_final() {
                if let Err(e) = deal.advance(DealState::Rejected(cause.to_string())) {
                    debug!("{}: {}", id, e);
                }
            }
            deal.target
        };

        match self
            .registry
            .transition(target, LifecycleState::MergeNegotiating, LifecycleState::Active)
            .await
        {
            Ok(()) => warn!("{} rejected, {} unlocked: {}", id, target, cause),
            Err(e) => debug!("{} rejected, {} left as is: {}", id, target, e),
        }
    }

    async fn advance(&self, id: DealId, next: DealState) -> KernelResult<Deal> {
        let mut deals = self.deals.lock().await;
        let deal = deals
            .get_mut(&id)
            .ok_or_else(|| KernelError::Rejected(format!("unknown deal {}", id)))?;
        deal.advance(next)?;
        Ok(deal.clone())
    }

    async fn record<F>(&self, id: DealId, f: F) -> KernelResult<()>
    where
        F: FnOnce(&mut Deal),
    {
        let mut deals = self.deals.lock().await;
        let deal = deals
            .get_mut(&id)
            .ok_or_else(|| KernelError::Rejected(format!("unknown deal {}", id)))?;
        f(deal);
        Ok(())
    }
}
