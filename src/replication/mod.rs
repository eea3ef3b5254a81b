//! Company replication: spawning a funded clone from an active parent.
//!
//! The parent is moved to `Replicating` with a compare-and-set before its
//! balance is read, so two replications of the same parent never both pass
//! the reserve check. The reserve is checked again atomically by the ledger
//! through a posting floor, so a loss landing between the read and the
//! submit still cannot take the parent below the reserve. A slot under the
//! company cap is reserved before anything moves, so concurrent replications
//! of different parents cannot overshoot `max_companies` either.

use crate::company::{CapTable, Company, CompanyRegistry, PositionBook, SlotReservation};
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::ledger::{Ledger, Receipt, Transaction, TransactionKind};
use crate::types::{Amount, CompanyId, Fraction, LifecycleState, OwnerId, ProposalId};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful replication.
#[derive(Debug, Clone)]
pub struct ReplicationOutcome {
    pub parent: CompanyId,
    pub clone: CompanyId,
    pub seed: Amount,
    pub cap_table: CapTable,
    pub receipt: Receipt,
}

pub struct Replicator {
    ledger: Arc<Ledger>,
    registry: Arc<CompanyRegistry>,
    minimum_reserve: Amount,
    retained_stake: Fraction,
    max_companies: usize,
}

impl Replicator {
    pub fn new(ledger: Arc<Ledger>, registry: Arc<CompanyRegistry>, config: &KernelConfig) -> Self {
        Self {
            ledger,
            registry,
            minimum_reserve: config.minimum_reserve(),
            retained_stake: config.parent_retained_stake(),
            max_companies: config.max_companies,
        }
    }

    pub fn minimum_reserve(&self) -> Amount {
        self.minimum_reserve
    }

    /// Validate and execute a replication of `parent` seeded with `seed`.
    ///
    /// The parent is `Active` again afterwards whether or not the clone was
    /// created. The clone starts in `Forming`.
    pub async fn propose_replicate(
        &self,
        parent: CompanyId,
        seed: Amount,
        cause: Option<ProposalId>,
        tick: u64,
    ) -> KernelResult<ReplicationOutcome> {
        if !seed.is_positive() {
            return Err(KernelError::InvalidAmount(format!(
                "replication seed {} must be positive",
                seed
            )));
        }
        let slot = self.registry.reserve_slot(self.max_companies).await?;

        self.registry
            .transition(parent, LifecycleState::Active, LifecycleState::Replicating)
            .await?;

        let result = self.spawn_clone(parent, seed, slot, cause, tick).await;

        if let Err(e) = self
            .registry
            .transition(parent, LifecycleState::Replicating, LifecycleState::Active)
            .await
        {
            warn!("{} could not leave replicating state: {}", parent, e);
        }

        result
    }

    async fn spawn_clone(
        &self,
        parent_id: CompanyId,
        seed: Amount,
        slot: SlotReservation,
        cause: Option<ProposalId>,
        tick: u64,
    ) -> KernelResult<ReplicationOutcome> {
        let parent = self.registry.get(parent_id).await?;
        let parent_account = self.ledger.account(parent.account).await?;

        let remaining = parent_account.balance - seed;
        if remaining < self.minimum_reserve {
            return Err(KernelError::InsufficientFunds {
                account: parent.account,
                balance: parent_account.balance,
                delta: -seed,
                floor: self.minimum_reserve,
            });
        }

        let cap_table = parent
            .cap_table
            .for_clone(OwnerId::Company(parent_id), self.retained_stake)?;

        let clone_id = self.registry.allocate_company_id().await;
        let clone_account_id = self
            .ledger
            .open_account(OwnerId::Company(clone_id), Amount::ZERO)
            .await?;
        let clone_account = self.ledger.account(clone_account_id).await?;

        let tx = Transaction::builder(TransactionKind::Replication)
            .caused_by(cause)
            .debit(&parent_account, seed)
            .credit(&clone_account, seed)
            .floor(parent.account, self.minimum_reserve)
            .memo(format!("{} seeds {}", parent_id, clone_id))
            .build();

        let receipt = match self.ledger.submit(tx).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Err(discard) = self.ledger.discard_account(clone_account_id).await {
                    warn!("Could not discard {}: {}", clone_account_id, discard);
                }
                return Err(e);
            }
        };

        let clone = Company {
            id: clone_id,
            name: format!("{} Clone {}", parent.name, clone_id.0),
            state: LifecycleState::Forming,
            cap_table: cap_table.clone(),
            account: clone_account_id,
            style: parent.style,
            parent: Some(parent_id),
            founded_tick: tick,
            book: PositionBook::default(),
            listed: false,
        };
        self.registry
            .insert_reserved(clone, slot)
            .await
            .map_err(|e| KernelError::IntegrityFault(format!("funded clone {} lost: {}", clone_id, e)))?;

        info!(
            "Replicated {} -> {} with seed {} (parent keeps {})",
            parent_id, clone_id, seed, self.retained_stake
        );

        Ok(ReplicationOutcome {
            parent: parent_id,
            clone: clone_id,
            seed,
            cap_table,
            receipt,
        })
    }
}
