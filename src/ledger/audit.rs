//! Immutable append-only ledger audit log.
//!
//! Every applied transaction is recorded with a logical sequence number.
//! The log is for replay and debugging; no business decision reads it.

use crate::error::{KernelError, KernelResult};
use crate::ledger::transaction::Transaction;
use crate::types::{AccountId, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An applied transaction and its position in the total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub transaction: Transaction,
    /// Wall time, informational only.
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction and return its sequence number.
    pub fn append(&mut self, transaction: Transaction) -> u64 {
        let sequence = self.records.len() as u64 + 1;
        self.records.push(AuditRecord {
            sequence,
            transaction,
            applied_at: Utc::now(),
        });
        sequence
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Net capital created (positive) or destroyed (negative) by boundary
    /// transactions.
    pub fn boundary_net(&self) -> Amount {
        self.records
            .iter()
            .filter(|r| r.transaction.kind().is_boundary())
            .map(|r| r.transaction.net())
            .sum()
    }

    /// Rebuild every account balance from an empty ledger.
    pub fn replay(&self) -> KernelResult<BTreeMap<AccountId, Amount>> {
        replay(&self.records)
    }
}

/// Replay `records` in order. Fails on a sequence gap, on an unbalanced
/// non-boundary transaction or if any balance would go negative.
pub fn replay(records: &[AuditRecord]) -> KernelResult<BTreeMap<AccountId, Amount>> {
    let mut balances: BTreeMap<AccountId, Amount> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        let expected = index as u64 + 1;
        if record.sequence != expected {
            return Err(KernelError::IntegrityFault(format!(
                "audit sequence gap: expected {}, found {}",
                expected, record.sequence
            )));
        }

        let tx = &record.transaction;
        if !tx.kind().is_boundary() && !tx.net().is_zero() {
            return Err(KernelError::IntegrityFault(format!(
                "{} ({}) is unbalanced by {}",
                tx.id(),
                tx.kind(),
                tx.net()
            )));
        }

        for posting in tx.postings() {
            let balance = balances.entry(posting.account).or_default();
            *balance += posting.delta;
            if balance.is_negative() {
                return Err(KernelError::IntegrityFault(format!(
                    "{} drives {} negative at sequence {}",
                    tx.id(),
                    posting.account,
                    record.sequence
                )));
            }
        }
    }

    Ok(balances)
}
