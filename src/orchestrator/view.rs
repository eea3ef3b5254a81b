//! Read-only portfolio queries for reporting collectors.

use crate::company::{Company, CompanyRegistry, CompanySummary};
use crate::error::KernelResult;
use crate::ledger::Ledger;
use crate::types::{Amount, CompanyId, Fraction, HolderId, OwnerId};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolderBalance {
    pub id: HolderId,
    pub name: String,
    pub balance: Amount,
    pub holdings: Vec<(CompanyId, Fraction)>,
}

/// Whole-portfolio snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub tick: u64,
    pub companies: Vec<CompanySummary>,
    pub holders: Vec<HolderBalance>,
    /// Sum of every account balance.
    pub total_capital: Amount,
    /// Capital that entered or left through boundary transactions.
    pub boundary_net: Amount,
    pub audit_records: usize,
}

#[derive(Clone)]
pub struct PortfolioView {
    ledger: Arc<Ledger>,
    registry: Arc<CompanyRegistry>,
}

impl PortfolioView {
    pub fn new(ledger: Arc<Ledger>, registry: Arc<CompanyRegistry>) -> Self {
        Self { ledger, registry }
    }

    pub async fn company(&self, id: CompanyId) -> KernelResult<CompanySummary> {
        let company = self.registry.get(id).await?;
        let balance = self.ledger.balance(company.account).await?;
        Ok(summarize(company, balance))
    }

    pub async fn companies(&self) -> KernelResult<Vec<CompanySummary>> {
        let companies = self.registry.list().await;
        let ids: Vec<_> = companies.iter().map(|c| c.account).collect();
        let accounts = self.ledger.accounts(&ids).await?;
        Ok(companies
            .into_iter()
            .zip(accounts)
            .map(|(c, a)| summarize(c, a.balance))
            .collect())
    }

    pub async fn holders(&self) -> KernelResult<Vec<HolderBalance>> {
        let mut rows = Vec::new();
        for holder in self.registry.holders().await {
            let balance = self.ledger.balance(holder.account).await?;
            let holdings = self.registry.holdings_of(OwnerId::Holder(holder.id)).await;
            rows.push(HolderBalance {
                id: holder.id,
                name: holder.name,
                balance,
                holdings,
            });
        }
        Ok(rows)
    }

    pub async fn snapshot(&self, tick: u64) -> KernelResult<PortfolioSnapshot> {
        Ok(PortfolioSnapshot {
            tick,
            companies: self.companies().await?,
            holders: self.holders().await?,
            total_capital: self.ledger.total_balance().await,
            boundary_net: self.ledger.boundary_net().await,
            audit_records: self.ledger.audit_log().await.len(),
        })
    }
}

fn summarize(company: Company, balance: Amount) -> CompanySummary {
    CompanySummary {
        id: company.id,
        stakes: company.cap_table.stakes().collect(),
        name: company.name,
        state: company.state,
        style: company.style,
        account: company.account,
        balance,
        exposure: company.book.total(),
        parent: company.parent,
    }
}
