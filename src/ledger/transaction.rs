//! Atomic units of ledger mutation.

use crate::ledger::AccountSnapshot;
use crate::types::{AccountId, Amount, ProposalId, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit tag of a transaction. Boundary kinds are the only ones allowed to
/// create or destroy capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Initial funding of a new account.
    Opening,
    /// Capital entering the system.
    Injection,
    /// Capital leaving the system (dividend, exit).
    Exit,
    /// Cash moving into or out of a market position.
    Position,
    /// Balanced transfer between two accounts.
    Transfer,
    /// Parent funding a clone.
    Replication,
    /// Acquirer paying a target's stakeholders.
    Acquisition,
    /// Liquidated company paying out its stakeholders.
    Liquidation,
}

impl TransactionKind {
    pub fn is_boundary(self) -> bool {
        matches!(
            self,
            Self::Opening | Self::Injection | Self::Exit | Self::Position
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Injection => write!(f, "injection"),
            Self::Exit => write!(f, "exit"),
            Self::Position => write!(f, "position"),
            Self::Transfer => write!(f, "transfer"),
            Self::Replication => write!(f, "replication"),
            Self::Acquisition => write!(f, "acquisition"),
            Self::Liquidation => write!(f, "liquidation"),
        }
    }
}

/// One account's delta within a transaction, guarded by the account version
/// the builder observed and a minimum post-transaction balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: AccountId,
    pub delta: Amount,
    pub observed_version: u64,
    pub floor: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    causing_proposal: Option<ProposalId>,
    postings: Vec<Posting>,
    memo: String,
}

impl Transaction {
    pub fn builder(kind: TransactionKind) -> TransactionBuilder {
        TransactionBuilder {
            kind,
            causing_proposal: None,
            postings: Vec::new(),
            memo: String::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn causing_proposal(&self) -> Option<ProposalId> {
        self.causing_proposal
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    /// Sum of all deltas.
    pub fn net(&self) -> Amount {
        self.postings.iter().map(|p| p.delta).sum()
    }

    /// Delta applied to `account`, zero if untouched.
    pub fn delta_for(&self, account: AccountId) -> Amount {
        self.postings
            .iter()
            .filter(|p| p.account == account)
            .map(|p| p.delta)
            .sum()
    }
}

/// Collects postings from account snapshots. Posting the same account twice
/// merges the deltas, so a transaction touches each account once.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    kind: TransactionKind,
    causing_proposal: Option<ProposalId>,
    postings: Vec<Posting>,
    memo: String,
}

impl TransactionBuilder {
    pub fn caused_by(mut self, proposal: Option<ProposalId>) -> Self {
        self.causing_proposal = proposal;
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn post(mut self, account: &AccountSnapshot, delta: Amount) -> Self {
        match self.postings.iter_mut().find(|p| p.account == account.id) {
            Some(existing) => existing.delta += delta,
            None => self.postings.push(Posting {
                account: account.id,
                delta,
                observed_version: account.version,
                floor: Amount::ZERO,
            }),
        }
        self
    }

    pub fn debit(self, account: &AccountSnapshot, amount: Amount) -> Self {
        self.post(account, -amount)
    }

    pub fn credit(self, account: &AccountSnapshot, amount: Amount) -> Self {
        self.post(account, amount)
    }

    /// Require `account` to hold at least `floor` after the transaction.
    /// Checked atomically at apply time.
    pub fn floor(mut self, account: AccountId, floor: Amount) -> Self {
        if let Some(posting) = self.postings.iter_mut().find(|p| p.account == account) {
            posting.floor = posting.floor.max(floor);
        }
        self
    }

    pub fn build(self) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            kind: self.kind,
            causing_proposal: self.causing_proposal,
            postings: self.postings,
            memo: self.memo,
        }
    }
}
