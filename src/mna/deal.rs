use crate::error::{KernelError, KernelResult};
use crate::ledger::Receipt;
use crate::types::{Amount, CompanyId, DealId, LifecycleState, ProposalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deal negotiation stages. `Settled` and `Rejected` are final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    Proposed,
    Valuing,
    Negotiating,
    Agreed,
    Settled,
    Rejected(String),
}

impl DealState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Settled | Self::Rejected(_))
    }

    fn can_advance_to(&self, next: &DealState) -> bool {
        use DealState::*;
        match (self, next) {
            (_, Rejected(_)) => !self.is_final(),
            (Proposed, Valuing) | (Valuing, Negotiating) | (Negotiating, Agreed) | (Agreed, Settled) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for DealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposed => write!(f, "proposed"),
            Self::Valuing => write!(f, "valuing"),
            Self::Negotiating => write!(f, "negotiating"),
            Self::Agreed => write!(f, "agreed"),
            Self::Settled => write!(f, "settled"),
            Self::Rejected(reason) => write!(f, "rejected ({})", reason),
        }
    }
}

/// One acquisition attempt from proposal to settlement or rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub acquirer: CompanyId,
    pub target: CompanyId,
    /// Target was listed when the deal opened; settles as a merger.
    pub consensual: bool,
    pub state: DealState,
    pub acquirer_value: Option<Amount>,
    pub target_value: Option<Amount>,
    pub price: Option<Amount>,
    pub cause: Option<ProposalId>,
    #[serde(skip)]
    pub settlement: Option<Receipt>,
    pub history: Vec<(DateTime<Utc>, DealState)>,
}

impl Deal {
    pub fn new(
        id: DealId,
        acquirer: CompanyId,
        target: CompanyId,
        consensual: bool,
        cause: Option<ProposalId>,
    ) -> Self {
        Self {
            id,
            acquirer,
            target,
            consensual,
            state: DealState::Proposed,
            acquirer_value: None,
            target_value: None,
            price: None,
            cause,
            settlement: None,
            history: vec![(Utc::now(), DealState::Proposed)],
        }
    }

    pub fn advance(&mut self, next: DealState) -> KernelResult<()> {
        if !self.state.can_advance_to(&next) {
            return Err(KernelError::Rejected(format!(
                "{} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.history.push((Utc::now(), next.clone()));
        self.state = next;
        Ok(())
    }

    /// Lifecycle state the target ends in once this deal settles.
    pub fn terminal_state(&self) -> LifecycleState {
        if self.consensual {
            LifecycleState::Merged
        } else {
            LifecycleState::Acquired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal() -> Deal {
        Deal::new(DealId(1), CompanyId(1), CompanyId(2), false, None)
    }

    #[test]
    fn test_happy_path_records_history() {
        let mut d = deal();
        d.advance(DealState::Valuing).unwrap();
        d.advance(DealState::Negotiating).unwrap();
        d.advance(DealState::Agreed).unwrap();
        d.advance(DealState::Settled).unwrap();
        assert_eq!(d.history.len(), 5);
        assert!(d.state.is_final());
    }

    #[test]
    fn test_cannot_skip_stages_or_leave_final_state() {
        let mut d = deal();
        assert!(d.advance(DealState::Settled).is_err());
        d.advance(DealState::Rejected("no".into())).unwrap();
        assert!(d.advance(DealState::Valuing).is_err());
        assert!(d.advance(DealState::Rejected("again".into())).is_err());
    }

    #[test]
    fn test_listing_decides_terminal_state() {
        assert_eq!(deal().terminal_state(), LifecycleState::Acquired);
        let merger = Deal::new(DealId(2), CompanyId(1), CompanyId(2), true, None);
        assert_eq!(merger.terminal_state(), LifecycleState::Merged);
    }
}
