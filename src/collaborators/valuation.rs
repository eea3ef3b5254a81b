//! Valuation service contract and two reference implementations.

use crate::company::CompanyRegistry;
use crate::error::{KernelError, KernelResult};
use crate::ledger::Ledger;
use crate::types::{Amount, CompanyId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Supplies a company's current estimated value. Must tolerate concurrent
/// callers; callers bound every call with a timeout.
#[async_trait]
pub trait ValuationService: Send + Sync {
    /// Estimated value, or `KernelError::Unavailable`.
    async fn estimate_value(&self, company: CompanyId) -> KernelResult<Amount>;
}

/// Fixed table of valuations. Companies without an entry are unavailable.
#[derive(Debug, Default)]
pub struct StaticValuation {
    values: RwLock<HashMap<CompanyId, Amount>>,
}

impl StaticValuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, company: CompanyId, value: Amount) {
        self.values.write().await.insert(company, value);
    }

    pub async fn remove(&self, company: CompanyId) {
        self.values.write().await.remove(&company);
    }
}

#[async_trait]
impl ValuationService for StaticValuation {
    async fn estimate_value(&self, company: CompanyId) -> KernelResult<Amount> {
        self.values
            .read()
            .await
            .get(&company)
            .copied()
            .ok_or_else(|| KernelError::Unavailable(format!("no valuation for {}", company)))
    }
}

/// Cash plus booked exposure, times a multiple in basis points.
pub struct BookValuation {
    ledger: Arc<Ledger>,
    registry: Arc<CompanyRegistry>,
    multiple_bps: i64,
}

impl BookValuation {
    pub fn new(ledger: Arc<Ledger>, registry: Arc<CompanyRegistry>, multiple_bps: i64) -> Self {
        Self {
            ledger,
            registry,
            multiple_bps,
        }
    }
}

#[async_trait]
impl ValuationService for BookValuation {
    async fn estimate_value(&self, company: CompanyId) -> KernelResult<Amount> {
        let record = self
            .registry
            .get(company)
            .await
            .map_err(|e| KernelError::Unavailable(e.to_string()))?;
        let cash = self
            .ledger
            .balance(record.account)
            .await
            .map_err(|e| KernelError::Unavailable(e.to_string()))?;
        Ok((cash + record.book.total()).scale_bps(self.multiple_bps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_valuation_reports_missing_as_unavailable() {
        let valuation = StaticValuation::new();
        valuation.set(CompanyId(1), Amount::from_major(10)).await;
        assert_eq!(
            valuation.estimate_value(CompanyId(1)).await.unwrap(),
            Amount::from_major(10)
        );
        assert!(matches!(
            valuation.estimate_value(CompanyId(2)).await,
            Err(KernelError::Unavailable(_))
        ));

        valuation.remove(CompanyId(1)).await;
        assert!(matches!(
            valuation.estimate_value(CompanyId(1)).await,
            Err(KernelError::Unavailable(_))
        ));
    }
}
