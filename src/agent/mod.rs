//! Decision loops ("AI CEOs").
//!
//! A loop sees an immutable [`CompanySnapshot`] and a [`MarketContext`] and
//! returns proposals. It has no handle on the ledger or the registry; the
//! orchestrator is the only thing that acts on what it emits.

pub mod ceo;
pub mod context;
pub mod market;
pub mod traits;

pub use ceo::{build_ceo, AggressiveCeo, ConservativeCeo, SpecialistCeo};
pub use context::{CompanySnapshot, Listing, MarketContext};
pub use market::{MarketAnalysis, MarketAnalyzer, Recommendation, Trend};
pub use traits::DecisionLoop;
