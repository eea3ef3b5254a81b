//! Equity cap tables.

use crate::error::{KernelError, KernelResult};
use crate::types::{Amount, Fraction, OwnerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Equity stakes in one company. Always sums to exactly [`Fraction::ONE`];
/// every constructor enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapTable {
    stakes: BTreeMap<OwnerId, Fraction>,
}

impl CapTable {
    /// One owner holding everything.
    pub fn sole(owner: OwnerId) -> Self {
        let mut stakes = BTreeMap::new();
        stakes.insert(owner, Fraction::ONE);
        Self { stakes }
    }

    /// Build from `(owner, fraction)` pairs. Repeated owners are merged and
    /// zero stakes dropped.
    pub fn from_stakes(
        stakes: impl IntoIterator<Item = (OwnerId, Fraction)>,
    ) -> KernelResult<Self> {
        let mut merged: BTreeMap<OwnerId, Fraction> = BTreeMap::new();
        for (owner, fraction) in stakes {
            if fraction.is_zero() {
                continue;
            }
            let entry = merged.entry(owner).or_default();
            *entry = entry.checked_add(fraction).ok_or_else(|| {
                KernelError::InvalidAmount(format!("stake of {} exceeds 1.0", owner))
            })?;
        }

        let table = Self { stakes: merged };
        if !table.is_complete() {
            return Err(KernelError::InvalidAmount(format!(
                "stakes sum to {} parts, expected {}",
                table.total_parts(),
                Fraction::ONE.parts()
            )));
        }
        Ok(table)
    }

    pub fn stakes(&self) -> impl Iterator<Item = (OwnerId, Fraction)> + '_ {
        self.stakes.iter().map(|(o, f)| (*o, *f))
    }

    pub fn stake_of(&self, owner: OwnerId) -> Fraction {
        self.stakes.get(&owner).copied().unwrap_or_default()
    }

    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.stakes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    pub fn total_parts(&self) -> u64 {
        self.stakes.values().map(|f| f.parts()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.total_parts() == Fraction::ONE.parts()
    }

    /// Largest holder; ties go to the lowest owner id.
    pub fn largest_holder(&self) -> Option<OwnerId> {
        self.stakes
            .iter()
            .max_by(|(oa, fa), (ob, fb)| fa.cmp(fb).then_with(|| ob.cmp(oa)))
            .map(|(o, _)| *o)
    }

    /// Split `amount` by stake. Truncation residue goes to the largest
    /// holder so the parts always add up to `amount`. Zero parts are omitted.
    pub fn pro_rata(&self, amount: Amount) -> Vec<(OwnerId, Amount)> {
        let mut shares: BTreeMap<OwnerId, Amount> = self
            .stakes
            .iter()
            .map(|(owner, fraction)| (*owner, amount.scale(*fraction)))
            .collect();

        let distributed: Amount = shares.values().copied().sum();
        if let Some(largest) = self.largest_holder() {
            if let Some(share) = shares.get_mut(&largest) {
                *share += amount - distributed;
            }
        }

        shares.into_iter().filter(|(_, a)| !a.is_zero()).collect()
    }

    /// Cap table for a clone: `parent` keeps `retained`, the remainder is
    /// split pro-rata among this table's stakeholders.
    pub fn for_clone(&self, parent: OwnerId, retained: Fraction) -> KernelResult<CapTable> {
        let remainder = retained.complement();
        let mut stakes: Vec<(OwnerId, Fraction)> = self
            .stakes
            .iter()
            .map(|(owner, fraction)| (*owner, remainder.of(*fraction)))
            .collect();

        let distributed: u64 = stakes.iter().map(|(_, f)| f.parts()).sum();
        let residue = remainder.parts() - distributed;
        if residue > 0 {
            if let Some(largest) = self.largest_holder() {
                stakes.push((largest, Fraction::from_parts(residue).unwrap_or_default()));
            }
        }

        stakes.push((parent, retained));
        CapTable::from_stakes(stakes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompanyId, HolderId};

    fn holder(n: u64) -> OwnerId {
        OwnerId::Holder(HolderId(n))
    }

    fn frac(v: f64) -> Fraction {
        Fraction::from_f64(v).unwrap()
    }

    #[test]
    fn test_from_stakes_requires_exact_total() {
        assert!(CapTable::from_stakes([(holder(1), frac(0.5)), (holder(2), frac(0.4))]).is_err());
        let table =
            CapTable::from_stakes([(holder(1), frac(0.5)), (holder(1), frac(0.25)), (holder(2), frac(0.25))])
                .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.stake_of(holder(1)), frac(0.75));
    }

    #[test]
    fn test_pro_rata_conserves_amount() {
        let third = Fraction::from_parts(333_333_333).unwrap();
        let table = CapTable::from_stakes([
            (holder(1), third),
            (holder(2), third),
            (holder(3), Fraction::from_parts(333_333_334).unwrap()),
        ])
        .unwrap();

        let payouts = table.pro_rata(Amount::from_minor(100));
        let total: Amount = payouts.iter().map(|(_, a)| *a).sum();
        assert_eq!(total, Amount::from_minor(100));
        assert_eq!(payouts.len(), 3);
    }

    #[test]
    fn test_clone_table_gives_parent_retained_stake() {
        let parent = OwnerId::Company(CompanyId(1));
        let founders =
            CapTable::from_stakes([(holder(1), frac(0.75)), (holder(2), frac(0.25))]).unwrap();

        let clone = founders.for_clone(parent, frac(0.6)).unwrap();

        assert!(clone.is_complete());
        assert_eq!(clone.stake_of(parent), frac(0.6));
        assert_eq!(clone.stake_of(holder(1)), frac(0.3));
        assert_eq!(clone.stake_of(holder(2)), frac(0.1));
    }

    #[test]
    fn test_clone_table_with_full_retention_has_single_owner() {
        let parent = OwnerId::Company(CompanyId(1));
        let clone = CapTable::sole(holder(1)).for_clone(parent, Fraction::ONE).unwrap();
        assert_eq!(clone, CapTable::sole(parent));
    }
}
