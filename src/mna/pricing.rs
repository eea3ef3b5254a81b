//! Acquisition pricing.

use crate::error::{KernelError, KernelResult};
use crate::types::Amount;

/// Price for the target: its valuation times the premium multiplier, in
/// basis points. The acquirer's own valuation must cover the price.
///
/// Same inputs always give the same price.
pub fn negotiate_price(
    acquirer_value: Amount,
    target_value: Amount,
    multiplier_bps: i64,
) -> KernelResult<Amount> {
    if !target_value.is_positive() {
        return Err(KernelError::Rejected(format!(
            "target valuation {} is not positive",
            target_value
        )));
    }
    let price = target_value.scale_bps(multiplier_bps);
    if !price.is_positive() {
        return Err(KernelError::Rejected(format!("price {} is not positive", price)));
    }
    if acquirer_value < price {
        return Err(KernelError::Rejected(format!(
            "acquirer valued at {} cannot cover price {}",
            acquirer_value, price
        )));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_is_applied() {
        let price = negotiate_price(
            Amount::from_major(1_000_000),
            Amount::from_major(400_000),
            12_000,
        )
        .unwrap();
        assert_eq!(price, Amount::from_major(480_000));
    }

    #[test]
    fn test_zero_premium_pays_valuation() {
        let price = negotiate_price(
            Amount::from_major(500_000),
            Amount::from_major(400_000),
            10_000,
        )
        .unwrap();
        assert_eq!(price, Amount::from_major(400_000));
    }

    #[test]
    fn test_acquirer_must_cover_price() {
        assert!(negotiate_price(
            Amount::from_major(450_000),
            Amount::from_major(400_000),
            12_000
        )
        .is_err());
    }

    #[test]
    fn test_worthless_target_is_rejected() {
        assert!(negotiate_price(Amount::from_major(1), Amount::ZERO, 12_000).is_err());
    }
}
