//! Kernel error taxonomy.
//!
//! Everything except [`KernelError::IntegrityFault`] is local to one proposal
//! or transaction: the action is dropped for the tick and the scheduler keeps
//! going.

use crate::types::{AccountId, Amount, CompanyId, LifecycleState, TransactionId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds in {account}: balance {balance}, required floor {floor}, delta {delta}")]
    InsufficientFunds {
        account: AccountId,
        balance: Amount,
        delta: Amount,
        floor: Amount,
    },

    #[error("version conflict on {account}: observed v{observed}, current v{current}")]
    Conflict {
        account: AccountId,
        observed: u64,
        current: u64,
    },

    #[error("{0} is already locked by a pending deal")]
    TargetLocked(CompanyId),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("{company} is {state}, which is incompatible with this action")]
    StaleProposal {
        company: CompanyId,
        state: LifecycleState,
    },

    #[error("unknown company {0}")]
    UnknownCompany(CompanyId),

    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("transaction {0} was already applied")]
    DuplicateTransaction(TransactionId),

    #[error("non-boundary transaction does not balance (net {0})")]
    Unbalanced(Amount),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("ledger integrity fault: {0}")]
    IntegrityFault(String),
}

impl KernelError {
    /// Only integrity faults stop the process; everything else drops one
    /// action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IntegrityFault(_))
    }
}

pub type KernelResult<T> = std::result::Result<T, KernelError>;
