//! Decision loop trait definition.

use crate::agent::{CompanySnapshot, MarketContext};
use crate::types::{CeoStyle, Proposal};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The single contract the kernel depends on for autonomous control.
///
/// Implementations may be slow, wrong or failing. The orchestrator bounds
/// every activation with a timeout and treats errors, panics and timeouts
/// as "no proposals this tick".
#[async_trait]
pub trait DecisionLoop: Send + Sync {
    /// Human-readable name (used in logs).
    fn name(&self) -> &str;

    fn style(&self) -> CeoStyle;

    /// Inspect the snapshot and emit zero or more proposals.
    async fn activate(
        &self,
        snapshot: &CompanySnapshot,
        market: &MarketContext,
    ) -> Result<Vec<Proposal>>;

    /// Fresh loop of the same style for a replicated company.
    fn fork(&self) -> Arc<dyn DecisionLoop>;
}
