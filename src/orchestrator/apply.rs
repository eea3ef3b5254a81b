//! Applying validated proposals to the ledger and registry.

use super::{Effect, Orchestrator};
use crate::agent::build_ceo;
use crate::company::Company;
use crate::error::{KernelError, KernelResult};
use crate::ledger::{Transaction, TransactionKind};
use crate::types::{
    Amount, CompanyId, LifecycleState, PositionChange, Proposal, ProposalId, ProposalPayload,
    Venue,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

impl Orchestrator {
    pub(super) async fn apply(&self, proposal: &Proposal, tick: u64) -> KernelResult<Effect> {
        let company = proposal.company();
        let cause = Some(proposal.id());

        match proposal.payload() {
            ProposalPayload::Liquidate => self.liquidate(company, cause).await,

            ProposalPayload::Trade { change } => {
                if change.venue != Venue::Trading {
                    return Err(KernelError::Rejected(format!(
                        "trade routed to {} instead of trading",
                        change.venue
                    )));
                }
                self.apply_position(company, change, cause).await
            }

            ProposalPayload::Invest { change } => {
                if !change.capital_delta.is_negative() || change.exposure_delta.is_negative() {
                    return Err(KernelError::Rejected(
                        "an investment must move capital into a position".into(),
                    ));
                }
                self.apply_position(company, change, cause).await
            }

            ProposalPayload::SellProperty { change } => {
                if change.venue != Venue::RealEstate
                    || change.capital_delta.is_negative()
                    || change.exposure_delta.is_positive()
                {
                    return Err(KernelError::Rejected(
                        "a property sale must release real estate exposure".into(),
                    ));
                }
                self.apply_position(company, change, cause).await
            }

            ProposalPayload::Replicate { seed } => {
                let outcome = self
                    .replicator
                    .propose_replicate(company, *seed, cause, tick)
                    .await?;
                let forked = self.loops.lock().await.get(&company).map(|ceo| ceo.fork());
                let ceo = match forked {
                    Some(ceo) => ceo,
                    None => {
                        let clone = self.registry.get(outcome.clone).await?;
                        build_ceo(clone.style, format!("{} CEO", clone.name))
                    }
                };
                self.loops.lock().await.insert(outcome.clone, ceo);
                Ok(Effect::Replicated {
                    clone: outcome.clone,
                    seed: outcome.seed,
                })
            }

            ProposalPayload::SeekAcquirer => {
                let state = self.registry.state_of(company).await?;
                if state != LifecycleState::Active {
                    return Err(KernelError::StaleProposal { company, state });
                }
                self.registry.update(company, |c| c.listed = true).await?;
                info!("{} is now open to offers", company);
                Ok(Effect::Listed)
            }

            ProposalPayload::OfferAcquisition { target } => {
                let deal = self.mna.acquire(company, *target, cause).await?;
                Ok(Effect::Acquired {
                    deal: deal.id,
                    target: deal.target,
                    price: deal.price.unwrap_or_default(),
                    terminal: deal.terminal_state(),
                })
            }
        }
    }

    /// Move a position's capital delta through the ledger and book the
    /// exposure.
    async fn apply_position(
        &self,
        company: CompanyId,
        change: &PositionChange,
        cause: Option<ProposalId>,
    ) -> KernelResult<Effect> {
        let record = self.registry.get(company).await?;
        if record.state != LifecycleState::Active {
            return Err(KernelError::StaleProposal {
                company,
                state: record.state,
            });
        }
        if change.capital_delta.is_zero() && change.exposure_delta.is_zero() {
            return Err(KernelError::InvalidAmount("empty position change".into()));
        }
        if change.exposure_delta.is_positive() && change.exposure_delta > -change.capital_delta {
            return Err(KernelError::Rejected(format!(
                "{} of {} exposure is not paid for by a capital delta of {}",
                change.exposure_delta, change.venue, change.capital_delta
            )));
        }
        let booked = record.book.exposure(change.venue);
        if -change.exposure_delta > booked {
            return Err(KernelError::Rejected(format!(
                "cannot unwind {} of {} exposure, {} booked",
                -change.exposure_delta, change.venue, booked
            )));
        }

        let account = self.ledger.account(record.account).await?;
        let tx = Transaction::builder(TransactionKind::Position)
            .caused_by(cause)
            .post(&account, change.capital_delta)
            .memo(format!("{} {} position", company, change.venue))
            .build();
        self.ledger.submit(tx).await?;
        self.registry.update(company, |c| c.book.apply(change)).await?;

        Ok(Effect::Position {
            venue: change.venue,
            capital_delta: change.capital_delta,
            exposure_delta: change.exposure_delta,
        })
    }

    /// Wind a company down: mark it `Liquidated`, pay its whole balance to
    /// its stakeholders pro rata and retire its loop. If the payout is
    /// rejected the company returns to its previous state.
    pub(super) async fn liquidate(
        &self,
        company: CompanyId,
        cause: Option<ProposalId>,
    ) -> KernelResult<Effect> {
        let record = self.registry.get(company).await?;
        let previous = record.state;
        if !previous.can_transition_to(LifecycleState::Liquidated) {
            return Err(KernelError::StaleProposal {
                company,
                state: previous,
            });
        }
        self.registry
            .transition(company, previous, LifecycleState::Liquidated)
            .await?;

        let paid_out = match self.pay_out(&record, cause).await {
            Ok(paid_out) => paid_out,
            Err(e) => {
                if let Err(restore) = self
                    .registry
                    .restore(company, LifecycleState::Liquidated, previous)
                    .await
                {
                    warn!("{} could not be restored to {}: {}", company, previous, restore);
                }
                return Err(e);
            }
        };

        if !record.book.total().is_zero() {
            warn!("{} liquidated with {} of exposure written off", company, record.book.total());
        }
        self.loops.lock().await.remove(&company);
        info!("{} liquidated, {} paid to stakeholders", company, paid_out);
        Ok(Effect::Liquidated { paid_out })
    }

    async fn pay_out(&self, record: &Company, cause: Option<ProposalId>) -> KernelResult<Amount> {
        let owners: Vec<_> = record.cap_table.owners().collect();
        let mut account_ids = Vec::with_capacity(owners.len() + 1);
        account_ids.push(record.account);
        for owner in &owners {
            account_ids.push(self.registry.account_of(*owner).await?);
        }
        let snapshots = self.ledger.accounts(&account_ids).await?;
        let (own, stakeholders) = snapshots
            .split_first()
            .ok_or_else(|| KernelError::UnknownAccount(record.account))?;

        let balance = own.balance;
        if !balance.is_positive() {
            return Ok(Amount::ZERO);
        }

        let by_owner: BTreeMap<_, _> = owners.iter().copied().zip(stakeholders).collect();
        let mut builder = Transaction::builder(TransactionKind::Liquidation)
            .caused_by(cause)
            .memo(format!("liquidation of {}", record.id))
            .debit(own, balance);
        for (owner, amount) in record.cap_table.pro_rata(balance) {
            let snapshot = by_owner
                .get(&owner)
                .ok_or_else(|| KernelError::Rejected(format!("no account for {}", owner)))?;
            builder = builder.credit(snapshot, amount);
        }
        self.ledger.submit(builder.build()).await?;
        Ok(balance)
    }
}
