//! External collaborators the kernel calls through narrow contracts:
//! valuation and strategy adapters, plus the market signal feed.
//!
//! All calls are bounded with [`bounded`]; a collaborator that hangs is
//! treated as unavailable.

pub mod feed;
pub mod strategy;
pub mod valuation;

pub use feed::{MarketFeed, MarketSignals};
pub use strategy::{PropertyDesk, StrategyAdapter, TradingDesk};
pub use valuation::{BookValuation, StaticValuation, ValuationService};

use crate::error::{KernelError, KernelResult};
use std::future::Future;
use std::time::Duration;

/// Run a collaborator call with a deadline. Timeouts become `Unavailable`.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> KernelResult<T>
where
    F: Future<Output = KernelResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(KernelError::Unavailable(format!(
            "{} timed out after {:?}",
            what, limit
        ))),
    }
}
