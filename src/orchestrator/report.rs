use crate::error::KernelError;
use crate::types::{Amount, CompanyId, DealId, LifecycleState, ProposalId, ProposalKind, Venue};
use std::fmt;

/// What an applied proposal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Position {
        venue: Venue,
        capital_delta: Amount,
        exposure_delta: Amount,
    },
    Replicated {
        clone: CompanyId,
        seed: Amount,
    },
    Listed,
    Acquired {
        deal: DealId,
        target: CompanyId,
        price: Amount,
        terminal: LifecycleState,
    },
    Liquidated {
        paid_out: Amount,
    },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position {
                venue,
                capital_delta,
                exposure_delta,
            } => write!(f, "{} capital {} exposure {}", venue, capital_delta, exposure_delta),
            Self::Replicated { clone, seed } => write!(f, "spawned {} with {}", clone, seed),
            Self::Listed => write!(f, "listed for acquisition"),
            Self::Acquired {
                deal,
                target,
                price,
                terminal,
            } => write!(f, "{}: {} {} for {}", deal, target, terminal, price),
            Self::Liquidated { paid_out } => write!(f, "liquidated, paid out {}", paid_out),
        }
    }
}

/// One proposal and what became of it.
#[derive(Debug, Clone)]
pub struct ProposalOutcome {
    pub proposal: ProposalId,
    pub company: CompanyId,
    pub kind: ProposalKind,
    pub result: Result<Effect, KernelError>,
}

impl ProposalOutcome {
    pub fn applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything that happened in one scheduler tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Loops that returned a proposal list in time.
    pub activated: Vec<CompanyId>,
    pub failed: Vec<(CompanyId, String)>,
    pub timed_out: Vec<CompanyId>,
    /// Clones that left `Forming` this tick.
    pub promoted: Vec<CompanyId>,
    /// Proposals dropped for naming a company other than their issuer.
    pub dropped: usize,
    /// In application order.
    pub outcomes: Vec<ProposalOutcome>,
    /// Companies wound down for falling below the liquidation floor.
    pub liquidated: Vec<CompanyId>,
}

impl TickReport {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied()).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.applied()
    }
}
