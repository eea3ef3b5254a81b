//! Company registry: the arena of company and holder records.
//!
//! Lifecycle transitions are compare-and-set under the registry lock, so
//! they are linearizable per company. That is what stops two deals from
//! locking the same target or two replications of one parent overlapping.

use crate::company::{CapTable, Company};
use crate::error::{KernelError, KernelResult};
use crate::types::{
    AccountId, Amount, CeoStyle, CompanyId, Fraction, HolderId, LifecycleState, OwnerId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// External stakeholder with a cash account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub id: HolderId,
    pub name: String,
    pub account: AccountId,
}

/// Read-only listing row for reporting collectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub id: CompanyId,
    pub name: String,
    pub state: LifecycleState,
    pub style: CeoStyle,
    pub account: AccountId,
    pub balance: Amount,
    pub exposure: Amount,
    pub parent: Option<CompanyId>,
    pub stakes: Vec<(OwnerId, Fraction)>,
}

#[derive(Debug, Default)]
struct RegistryState {
    companies: BTreeMap<CompanyId, Company>,
    holders: BTreeMap<HolderId, Holder>,
    next_company: u64,
    next_holder: u64,
}

impl RegistryState {
    fn company(&self, id: CompanyId) -> KernelResult<&Company> {
        self.companies.get(&id).ok_or(KernelError::UnknownCompany(id))
    }

    fn company_mut(&mut self, id: CompanyId) -> KernelResult<&mut Company> {
        self.companies
            .get_mut(&id)
            .ok_or(KernelError::UnknownCompany(id))
    }

    fn insert(&mut self, company: Company) -> KernelResult<()> {
        if !company.cap_table.is_complete() {
            return Err(KernelError::InvalidAmount(format!(
                "cap table of {} is incomplete",
                company.id
            )));
        }
        if self.companies.contains_key(&company.id) {
            return Err(KernelError::Rejected(format!("{} already registered", company.id)));
        }
        info!("Registered {} '{}' ({})", company.id, company.name, company.state);
        self.companies.insert(company.id, company);
        Ok(())
    }
}

/// Claim on one live-company slot under the cap. Consumed by
/// [`CompanyRegistry::insert_reserved`]; dropping it unused frees the slot.
#[derive(Debug)]
pub struct SlotReservation {
    pending: Arc<AtomicUsize>,
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct CompanyRegistry {
    state: Mutex<RegistryState>,
    /// Slots reserved but not yet filled.
    pending: Arc<AtomicUsize>,
}

impl CompanyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn allocate_company_id(&self) -> CompanyId {
        let mut state = self.state.lock().await;
        state.next_company += 1;
        CompanyId(state.next_company)
    }

    pub async fn allocate_holder_id(&self) -> HolderId {
        let mut state = self.state.lock().await;
        state.next_holder += 1;
        HolderId(state.next_holder)
    }

    pub async fn insert(&self, company: Company) -> KernelResult<()> {
        let mut state = self.state.lock().await;
        state.insert(company)
    }

    /// Reserve room for one more live company, counting live companies and
    /// outstanding reservations under the registry lock.
    pub async fn reserve_slot(&self, max_companies: usize) -> KernelResult<SlotReservation> {
        let state = self.state.lock().await;
        let live = state
            .companies
            .values()
            .filter(|c| !c.state.is_terminal())
            .count();
        if live + self.pending.load(Ordering::SeqCst) >= max_companies {
            return Err(KernelError::Rejected(format!(
                "company cap of {} reached",
                max_companies
            )));
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        Ok(SlotReservation {
            pending: self.pending.clone(),
        })
    }

    /// Insert into a reserved slot. The slot is released in the same
    /// critical section, so the count never dips below what is live.
    pub async fn insert_reserved(&self, company: Company, slot: SlotReservation) -> KernelResult<()> {
        let mut state = self.state.lock().await;
        let result = state.insert(company);
        drop(slot);
        result
    }

    pub async fn insert_holder(&self, holder: Holder) {
        let mut state = self.state.lock().await;
        state.holders.insert(holder.id, holder);
    }

    pub async fn get(&self, id: CompanyId) -> KernelResult<Company> {
        let state = self.state.lock().await;
        state.company(id).cloned()
    }

    pub async fn holder(&self, id: HolderId) -> KernelResult<Holder> {
        let state = self.state.lock().await;
        state
            .holders
            .get(&id)
            .cloned()
            .ok_or_else(|| KernelError::Rejected(format!("unknown holder {}", id)))
    }

    /// Cash account that receives payouts for `owner`.
    pub async fn account_of(&self, owner: OwnerId) -> KernelResult<AccountId> {
        let state = self.state.lock().await;
        match owner {
            OwnerId::Company(id) => state.company(id).map(|c| c.account),
            OwnerId::Holder(id) => state
                .holders
                .get(&id)
                .map(|h| h.account)
                .ok_or_else(|| KernelError::Rejected(format!("unknown holder {}", id))),
        }
    }

    pub async fn state_of(&self, id: CompanyId) -> KernelResult<LifecycleState> {
        let state = self.state.lock().await;
        state.company(id).map(|c| c.state)
    }

    /// Compare-and-set a lifecycle transition.
    ///
    /// Fails with `TargetLocked` when the company is already mid-deal and a
    /// second lock is attempted, `StaleProposal` for any other mismatch.
    pub async fn transition(
        &self,
        id: CompanyId,
        from: LifecycleState,
        to: LifecycleState,
    ) -> KernelResult<()> {
        if !from.can_transition_to(to) {
            return Err(KernelError::Rejected(format!(
                "illegal lifecycle edge {} -> {}",
                from, to
            )));
        }
        let mut state = self.state.lock().await;
        let company = state.company_mut(id)?;
        if company.state != from {
            if company.state == LifecycleState::MergeNegotiating
                && to == LifecycleState::MergeNegotiating
            {
                return Err(KernelError::TargetLocked(id));
            }
            return Err(KernelError::StaleProposal {
                company: id,
                state: company.state,
            });
        }
        company.state = to;
        info!("{} {} -> {}", id, from, to);
        Ok(())
    }

    /// Undo a transition this process just made when the follow-up ledger
    /// transaction was rejected. Only succeeds if nothing moved in between.
    pub(crate) async fn restore(
        &self,
        id: CompanyId,
        current: LifecycleState,
        previous: LifecycleState,
    ) -> KernelResult<()> {
        let mut state = self.state.lock().await;
        let company = state.company_mut(id)?;
        if company.state != current {
            return Err(KernelError::StaleProposal {
                company: id,
                state: company.state,
            });
        }
        company.state = previous;
        info!("{} restored {} -> {}", id, current, previous);
        Ok(())
    }

    /// Hand `target` over to `acquirer`: sole ownership, terminal state,
    /// delisted. One lock, so observers never see a half-finished handover.
    pub async fn complete_takeover(
        &self,
        target: CompanyId,
        acquirer: CompanyId,
        terminal: LifecycleState,
    ) -> KernelResult<()> {
        let mut state = self.state.lock().await;
        state.company(acquirer)?;
        let company = state.company_mut(target)?;
        if company.state != LifecycleState::MergeNegotiating
            || !LifecycleState::MergeNegotiating.can_transition_to(terminal)
        {
            return Err(KernelError::StaleProposal {
                company: target,
                state: company.state,
            });
        }
        company.cap_table = CapTable::sole(OwnerId::Company(acquirer));
        company.state = terminal;
        company.listed = false;
        info!("{} {} by {}", target, terminal, acquirer);
        Ok(())
    }

    /// Apply a mutation to bookkeeping fields (book, listing). Lifecycle
    /// state and cap table have their own guarded entry points.
    pub(crate) async fn update<F>(&self, id: CompanyId, f: F) -> KernelResult<Company>
    where
        F: FnOnce(&mut Company),
    {
        let mut state = self.state.lock().await;
        let company = state.company_mut(id)?;
        let (lifecycle, cap_table) = (company.state, company.cap_table.clone());
        f(&mut *company);
        company.state = lifecycle;
        company.cap_table = cap_table;
        Ok(company.clone())
    }

    pub async fn list(&self) -> Vec<Company> {
        let state = self.state.lock().await;
        state.companies.values().cloned().collect()
    }

    pub async fn holders(&self) -> Vec<Holder> {
        let state = self.state.lock().await;
        state.holders.values().cloned().collect()
    }

    /// Companies whose loops run this tick, in id order.
    pub async fn schedulable(&self) -> Vec<Company> {
        let state = self.state.lock().await;
        state
            .companies
            .values()
            .filter(|c| c.state.is_schedulable())
            .cloned()
            .collect()
    }

    /// Companies open to offers.
    pub async fn listed(&self) -> Vec<CompanyId> {
        let state = self.state.lock().await;
        state
            .companies
            .values()
            .filter(|c| c.listed && c.state == LifecycleState::Active)
            .map(|c| c.id)
            .collect()
    }

    /// Non-terminal companies.
    pub async fn live_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .companies
            .values()
            .filter(|c| !c.state.is_terminal())
            .count()
    }

    /// Every stake `owner` holds.
    pub async fn holdings_of(&self, owner: OwnerId) -> Vec<(CompanyId, Fraction)> {
        let state = self.state.lock().await;
        state
            .companies
            .values()
            .map(|c| (c.id, c.cap_table.stake_of(owner)))
            .filter(|(_, f)| !f.is_zero())
            .collect()
    }

    /// Every cap table must sum to exactly one.
    pub async fn verify_stakes(&self) -> KernelResult<()> {
        let state = self.state.lock().await;
        for company in state.companies.values() {
            if !company.cap_table.is_complete() {
                let reason = format!(
                    "stakes of {} sum to {} parts",
                    company.id,
                    company.cap_table.total_parts()
                );
                error!("Registry integrity fault: {}", reason);
                return Err(KernelError::IntegrityFault(reason));
            }
        }
        Ok(())
    }
}
