//! Shared types used across the kernel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ulid::Ulid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Company identifier, allocated sequentially by the registry.
    CompanyId,
    "co"
);
numeric_id!(
    /// External stakeholder (founder, investor) identifier.
    HolderId,
    "holder"
);
numeric_id!(
    /// Ledger account identifier.
    AccountId,
    "acct"
);
numeric_id!(
    /// Pending or finished M&A deal identifier.
    DealId,
    "deal"
);

/// Identifier of a ledger transaction. Reusing one is how idempotence is
/// enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(Ulid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prop-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Minor units per major currency unit.
pub const AMOUNT_SCALE: i64 = 100;

/// Fixed-point money amount with two decimal places. Signed so that it can
/// double as a ledger delta; account balances are kept non-negative by the
/// ledger, not by the type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_major(units: i64) -> Self {
        Self(units * AMOUNT_SCALE)
    }

    /// Convert a major-unit float (config surface) to fixed point, rounding
    /// to the nearest minor unit.
    pub fn from_major_f64(units: f64) -> Self {
        Self((units * AMOUNT_SCALE as f64).round() as i64)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Multiply by a stake fraction, truncating toward zero.
    pub fn scale(self, fraction: Fraction) -> Amount {
        let scaled = self.0 as i128 * fraction.parts() as i128 / FRACTION_SCALE as i128;
        Amount(scaled as i64)
    }

    /// Multiply by a basis-point factor (10_000 = 1.0), truncating toward zero.
    pub fn scale_bps(self, bps: i64) -> Amount {
        Amount((self.0 as i128 * bps as i128 / 10_000) as i64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = AMOUNT_SCALE as u64;
        write!(f, "{}{}.{:02}", sign, abs / scale, abs % scale)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

// ---------------------------------------------------------------------------
// Equity fractions
// ---------------------------------------------------------------------------

/// Parts per whole for [`Fraction`].
pub const FRACTION_SCALE: u64 = 1_000_000_000;

/// Fixed-point equity fraction in `[0, 1]`. Fixed point keeps cap-table sums
/// exact, so "sums to 1.0" is an equality check.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fraction(u64);

impl Fraction {
    pub const ZERO: Fraction = Fraction(0);
    pub const ONE: Fraction = Fraction(FRACTION_SCALE);

    /// Build from raw parts; `None` if above one.
    pub const fn from_parts(parts: u64) -> Option<Self> {
        if parts > FRACTION_SCALE {
            None
        } else {
            Some(Self(parts))
        }
    }

    /// Build from a float in `[0, 1]`; `None` if out of range or not finite.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return None;
        }
        Some(Self((value * FRACTION_SCALE as f64).round() as u64))
    }

    pub const fn parts(self) -> u64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FRACTION_SCALE as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `1 - self`.
    pub const fn complement(self) -> Fraction {
        Fraction(FRACTION_SCALE - self.0)
    }

    /// `self * other`, truncating.
    pub fn of(self, other: Fraction) -> Fraction {
        Fraction((self.0 as u128 * other.0 as u128 / FRACTION_SCALE as u128) as u64)
    }

    pub fn checked_add(self, other: Fraction) -> Option<Fraction> {
        self.0
            .checked_add(other.0)
            .filter(|p| *p <= FRACTION_SCALE)
            .map(Fraction)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Owner of an equity stake: another company's treasury or an external
/// holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerId {
    Company(CompanyId),
    Holder(HolderId),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Company(id) => write!(f, "{}", id),
            Self::Holder(id) => write!(f, "{}", id),
        }
    }
}

// ---------------------------------------------------------------------------
// Company lifecycle state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Spawned by replication, not yet activated once.
    Forming,
    /// Normal operation.
    Active,
    /// Spawning a clone; blocks concurrent replications.
    Replicating,
    /// Locked as the target of a pending deal.
    MergeNegotiating,
    /// Absorbed in a consensual deal (terminal).
    Merged,
    /// Bought in an unsolicited deal (terminal).
    Acquired,
    /// Wound down, balance paid out (terminal).
    Liquidated,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Acquired | Self::Liquidated)
    }

    /// States whose decision loop is activated each tick.
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Active | Self::Forming)
    }

    /// Allowed edges of the lifecycle graph.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Forming, Active)
                | (Forming, Liquidated)
                | (Active, Replicating)
                | (Active, MergeNegotiating)
                | (Active, Liquidated)
                | (Replicating, Active)
                | (MergeNegotiating, Active)
                | (MergeNegotiating, Merged)
                | (MergeNegotiating, Acquired)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forming => write!(f, "forming"),
            Self::Active => write!(f, "active"),
            Self::Replicating => write!(f, "replicating"),
            Self::MergeNegotiating => write!(f, "merge_negotiating"),
            Self::Merged => write!(f, "merged"),
            Self::Acquired => write!(f, "acquired"),
            Self::Liquidated => write!(f, "liquidated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Which strategy adapter produced a position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Trading,
    RealEstate,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trading => write!(f, "trading"),
            Self::RealEstate => write!(f, "real_estate"),
        }
    }
}

/// Capital-delta description returned by a strategy adapter. The kernel only
/// moves `capital_delta` through the ledger and records `exposure_delta` on
/// the company's book; it never interprets the position itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    pub venue: Venue,
    /// Cash effect on the company account (negative = capital committed).
    pub capital_delta: Amount,
    /// Change in book exposure for the venue.
    pub exposure_delta: Amount,
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    Invest,
    Replicate,
    SeekAcquirer,
    OfferAcquisition,
    Trade,
    SellProperty,
    Liquidate,
}

impl ProposalKind {
    /// Application order within a tick; lower runs first.
    pub fn priority(self) -> u8 {
        match self {
            Self::Liquidate => 0,
            Self::SellProperty => 1,
            Self::Trade => 2,
            Self::Invest => 3,
            Self::Replicate => 4,
            Self::SeekAcquirer => 5,
            Self::OfferAcquisition => 6,
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invest => write!(f, "invest"),
            Self::Replicate => write!(f, "replicate"),
            Self::SeekAcquirer => write!(f, "seek_acquirer"),
            Self::OfferAcquisition => write!(f, "offer_acquisition"),
            Self::Trade => write!(f, "trade"),
            Self::SellProperty => write!(f, "sell_property"),
            Self::Liquidate => write!(f, "liquidate"),
        }
    }
}

/// Kind-specific proposal data. The kind is derived from the payload so the
/// two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalPayload {
    /// Commit capital to a longer-held position (e.g. buy property).
    Invest { change: PositionChange },
    Replicate { seed: Amount },
    SeekAcquirer,
    OfferAcquisition { target: CompanyId },
    Trade { change: PositionChange },
    SellProperty { change: PositionChange },
    Liquidate,
}

impl ProposalPayload {
    pub fn kind(&self) -> ProposalKind {
        match self {
            Self::Invest { .. } => ProposalKind::Invest,
            Self::Replicate { .. } => ProposalKind::Replicate,
            Self::SeekAcquirer => ProposalKind::SeekAcquirer,
            Self::OfferAcquisition { .. } => ProposalKind::OfferAcquisition,
            Self::Trade { .. } => ProposalKind::Trade,
            Self::SellProperty { .. } => ProposalKind::SellProperty,
            Self::Liquidate => ProposalKind::Liquidate,
        }
    }
}

/// Immutable request for a capital- or lifecycle-affecting action, emitted by
/// a decision loop and consumed exactly once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    id: ProposalId,
    company: CompanyId,
    payload: ProposalPayload,
    issued_at_tick: u64,
}

impl Proposal {
    pub fn new(company: CompanyId, issued_at_tick: u64, payload: ProposalPayload) -> Self {
        Self {
            id: ProposalId::new(),
            company,
            payload,
            issued_at_tick,
        }
    }

    pub fn id(&self) -> ProposalId {
        self.id
    }

    pub fn company(&self) -> CompanyId {
        self.company
    }

    pub fn payload(&self) -> &ProposalPayload {
        &self.payload
    }

    pub fn kind(&self) -> ProposalKind {
        self.payload.kind()
    }

    pub fn issued_at_tick(&self) -> u64 {
        self.issued_at_tick
    }

    /// Deterministic application order: `(kind priority, tick, company)`.
    pub fn sort_key(&self) -> (u8, u64, CompanyId) {
        (self.kind().priority(), self.issued_at_tick, self.company)
    }
}

// ---------------------------------------------------------------------------
// CEO styles
// ---------------------------------------------------------------------------

/// Reference decision-loop styles selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeoStyle {
    Conservative,
    Aggressive,
    Specialist,
}

impl Default for CeoStyle {
    fn default() -> Self {
        Self::Conservative
    }
}

impl fmt::Display for CeoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Aggressive => write!(f, "aggressive"),
            Self::Specialist => write!(f, "specialist"),
        }
    }
}
