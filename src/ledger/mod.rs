//! Capital ledger: the single owner of every balance.
//!
//! All mutation goes through [`Ledger::submit`]. Submissions are serialized
//! behind one mutex and validated against the account versions the caller
//! observed, so a transaction built from a stale read is rejected whole with
//! [`KernelError::Conflict`] instead of overwriting a concurrent winner.

pub mod audit;
pub mod transaction;

pub use audit::{AuditLog, AuditRecord};
pub use transaction::{Posting, Transaction, TransactionBuilder, TransactionKind};

use crate::error::{KernelError, KernelResult};
use crate::types::{AccountId, Amount, OwnerId, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Point-in-time copy of one account. Stale the moment it is returned;
/// carry its `version` into a transaction to have the ledger re-check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub owner: OwnerId,
    pub balance: Amount,
    pub version: u64,
}

/// Proof that a transaction was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction: TransactionId,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
struct Account {
    owner: OwnerId,
    balance: Amount,
    version: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    next_account: u64,
    applied: HashSet<TransactionId>,
    audit: AuditLog,
    halted: Option<String>,
}

impl LedgerState {
    fn snapshot(&self, id: AccountId) -> KernelResult<AccountSnapshot> {
        let account = self
            .accounts
            .get(&id)
            .ok_or(KernelError::UnknownAccount(id))?;
        Ok(AccountSnapshot {
            id,
            owner: account.owner,
            balance: account.balance,
            version: account.version,
        })
    }

    /// Validate everything first, then mutate. Nothing is visible unless the
    /// whole transaction passes.
    fn apply(&mut self, tx: Transaction) -> KernelResult<Receipt> {
        if let Some(reason) = &self.halted {
            return Err(KernelError::IntegrityFault(reason.clone()));
        }
        if self.applied.contains(&tx.id()) {
            return Err(KernelError::DuplicateTransaction(tx.id()));
        }
        if tx.postings().is_empty() {
            return Err(KernelError::InvalidAmount("transaction has no postings".into()));
        }

        match tx.kind() {
            TransactionKind::Opening | TransactionKind::Injection => {
                if tx.postings().iter().any(|p| p.delta.is_negative()) {
                    return Err(KernelError::InvalidAmount(format!(
                        "{} transaction carries a debit",
                        tx.kind()
                    )));
                }
            }
            TransactionKind::Exit => {
                if tx.postings().iter().any(|p| p.delta.is_positive()) {
                    return Err(KernelError::InvalidAmount(
                        "exit transaction carries a credit".into(),
                    ));
                }
            }
            kind if !kind.is_boundary() => {
                let net = tx.net();
                if !net.is_zero() {
                    return Err(KernelError::Unbalanced(net));
                }
            }
            _ => {}
        }

        for posting in tx.postings() {
            let account = self
                .accounts
                .get(&posting.account)
                .ok_or(KernelError::UnknownAccount(posting.account))?;

            if account.version != posting.observed_version {
                return Err(KernelError::Conflict {
                    account: posting.account,
                    observed: posting.observed_version,
                    current: account.version,
                });
            }

            let floor = posting.floor.max(Amount::ZERO);
            let after = account
                .balance
                .checked_add(posting.delta)
                .ok_or_else(|| KernelError::InvalidAmount("balance overflow".into()))?;
            if after < floor {
                return Err(KernelError::InsufficientFunds {
                    account: posting.account,
                    balance: account.balance,
                    delta: posting.delta,
                    floor,
                });
            }
        }

        for posting in tx.postings() {
            if let Some(account) = self.accounts.get_mut(&posting.account) {
                account.balance += posting.delta;
                account.version += 1;
            }
        }

        let id = tx.id();
        debug!("Applied {} ({}, {} postings)", id, tx.kind(), tx.postings().len());
        self.applied.insert(id);
        let sequence = self.audit.append(tx);
        Ok(Receipt {
            transaction: id,
            sequence,
        })
    }
}

/// The shared capital ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account for `owner`. A positive `initial` balance is recorded
    /// as an `Opening` boundary transaction.
    pub async fn open_account(&self, owner: OwnerId, initial: Amount) -> KernelResult<AccountId> {
        if initial.is_negative() {
            return Err(KernelError::InvalidAmount(format!(
                "initial balance {} is negative",
                initial
            )));
        }

        let mut state = self.state.lock().await;
        if let Some(reason) = &state.halted {
            return Err(KernelError::IntegrityFault(reason.clone()));
        }

        state.next_account += 1;
        let id = AccountId(state.next_account);
        state.accounts.insert(
            id,
            Account {
                owner,
                balance: Amount::ZERO,
                version: 0,
            },
        );

        if initial.is_positive() {
            let snapshot = state.snapshot(id)?;
            let tx = Transaction::builder(TransactionKind::Opening)
                .credit(&snapshot, initial)
                .memo(format!("opening balance for {}", owner))
                .build();
            state.apply(tx)?;
        }

        debug!("Opened {} for {} with {}", id, owner, initial);
        Ok(id)
    }

    /// Apply `tx` atomically or reject it whole.
    pub async fn submit(&self, tx: Transaction) -> KernelResult<Receipt> {
        let mut state = self.state.lock().await;
        let id = tx.id();
        let kind = tx.kind();
        state.apply(tx).map_err(|e| {
            debug!("Rejected {} ({}): {}", id, kind, e);
            e
        })
    }

    pub async fn balance(&self, id: AccountId) -> KernelResult<Amount> {
        let state = self.state.lock().await;
        state.snapshot(id).map(|s| s.balance)
    }

    pub async fn account(&self, id: AccountId) -> KernelResult<AccountSnapshot> {
        let state = self.state.lock().await;
        state.snapshot(id)
    }

    /// Snapshot several accounts under one lock, so they are mutually
    /// consistent.
    pub async fn accounts(&self, ids: &[AccountId]) -> KernelResult<Vec<AccountSnapshot>> {
        let state = self.state.lock().await;
        ids.iter().map(|id| state.snapshot(*id)).collect()
    }

    /// Sum of every account balance.
    pub async fn total_balance(&self) -> Amount {
        let state = self.state.lock().await;
        state.accounts.values().map(|a| a.balance).sum()
    }

    /// Net capital created by tagged boundary transactions.
    pub async fn boundary_net(&self) -> Amount {
        let state = self.state.lock().await;
        state.audit.boundary_net()
    }

    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        let state = self.state.lock().await;
        state.audit.records().to_vec()
    }

    /// Remove an account that never saw a transaction.
    pub async fn discard_account(&self, id: AccountId) -> KernelResult<()> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get(&id)
            .ok_or(KernelError::UnknownAccount(id))?;
        if account.version != 0 || !account.balance.is_zero() {
            return Err(KernelError::Rejected(format!("{} has history", id)));
        }
        state.accounts.remove(&id);
        Ok(())
    }

    /// Replay the audit log and compare with live balances. On mismatch the
    /// ledger halts: every later open or submit fails with the same fault.
    pub async fn verify(&self) -> KernelResult<()> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.halted {
            return Err(KernelError::IntegrityFault(reason.clone()));
        }

        let fault = match state.audit.replay() {
            Err(e) => Some(e.to_string()),
            Ok(replayed) => state.accounts.iter().find_map(|(id, account)| {
                let expected = replayed.get(id).copied().unwrap_or_default();
                if account.balance.is_negative() {
                    Some(format!("{} holds negative balance {}", id, account.balance))
                } else if account.balance != expected {
                    Some(format!(
                        "{} holds {} but audit replay gives {}",
                        id, account.balance, expected
                    ))
                } else {
                    None
                }
            }),
        };

        match fault {
            Some(reason) => {
                error!("Ledger halted: {}", reason);
                state.halted = Some(reason.clone());
                Err(KernelError::IntegrityFault(reason))
            }
            None => Ok(()),
        }
    }

    pub async fn is_halted(&self) -> bool {
        self.state.lock().await.halted.is_some()
    }

    #[cfg(test)]
    pub(crate) async fn corrupt_balance(&self, id: AccountId, balance: Amount) {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(&id) {
            account.balance = balance;
        }
    }
}
