//! Company records and their arena-style registry.
//!
//! Companies reference each other only by id: ownership edges live in cap
//! tables as [`OwnerId`]s, never as pointers.

pub mod cap_table;
pub mod registry;

pub use cap_table::CapTable;
pub use registry::{CompanyRegistry, CompanySummary, Holder, SlotReservation};

use crate::types::{AccountId, Amount, CeoStyle, CompanyId, LifecycleState, PositionChange, Venue};
use serde::{Deserialize, Serialize};

/// Per-venue exposure the company carries on its own books.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBook {
    pub trading: Amount,
    pub real_estate: Amount,
}

impl PositionBook {
    pub fn exposure(&self, venue: Venue) -> Amount {
        match venue {
            Venue::Trading => self.trading,
            Venue::RealEstate => self.real_estate,
        }
    }

    /// Record an applied position change; exposure never goes below zero.
    pub fn apply(&mut self, change: &PositionChange) {
        let slot = match change.venue {
            Venue::Trading => &mut self.trading,
            Venue::RealEstate => &mut self.real_estate,
        };
        *slot = (*slot + change.exposure_delta).max(Amount::ZERO);
    }

    pub fn total(&self) -> Amount {
        self.trading + self.real_estate
    }
}

/// A company as held by the registry. Decision loops only ever see clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub state: LifecycleState,
    pub cap_table: CapTable,
    pub account: AccountId,
    pub style: CeoStyle,
    /// Company this one was replicated from.
    pub parent: Option<CompanyId>,
    pub founded_tick: u64,
    pub book: PositionBook,
    /// Set by a `SeekAcquirer` proposal; visible to other loops next tick.
    pub listed: bool,
}
