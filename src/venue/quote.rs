//! Constant-product quote math - pure, no side effects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::venue::VenueId;

/// Estimated output for a given input, venue, and reserves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub venue: VenueId,
    pub expected_out: Decimal,
    pub price_impact_pct: Decimal,
    pub fee_pct: Decimal,
}

/// Expected output and price impact for `amount_in` against a pool holding
/// (`reserve_in`, `reserve_out`) with `fee_pct` taken off the input.
///
/// An empty input-side reserve has no defined price and is an error rather
/// than a division toward infinity.
pub fn constant_product_out(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee_pct: Decimal,
) -> Result<(Decimal, Decimal)> {
    if amount_in <= Decimal::ZERO {
        return Err(Error::Venue(format!("amount_in must be > 0, got {amount_in}")));
    }
    if reserve_in <= Decimal::ZERO {
        return Err(Error::Venue(format!(
            "undefined price: input reserve is {reserve_in}"
        )));
    }

    let amount_after_fee = amount_in * (Decimal::ONE - fee_pct / Decimal::ONE_HUNDRED);
    let expected_out = amount_after_fee * reserve_out / (reserve_in + amount_after_fee);
    let price_impact_pct = amount_in / reserve_in * Decimal::ONE_HUNDRED;

    Ok((expected_out, price_impact_pct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn known_numbers() {
        // reserves 100000/100000, fee 0.25%, amount 1000:
        // after-fee 997.5, out = 997.5 * 100000 / 100997.5 ≈ 987.6482
        let (out, impact) =
            constant_product_out(dec!(1000), dec!(100000), dec!(100000), dec!(0.25)).unwrap();
        assert!((out - dec!(987.6482)).abs() < dec!(0.0001), "out = {out}");
        assert_eq!(impact, dec!(1));
    }

    #[test]
    fn zero_fee_pool() {
        let (out, _) =
            constant_product_out(dec!(1000), dec!(100000), dec!(100000), Decimal::ZERO).unwrap();
        // 1000 * 100000 / 101000
        assert!((out - dec!(990.0990)).abs() < dec!(0.0001), "out = {out}");
    }

    #[test]
    fn empty_input_reserve_is_an_error() {
        let err = constant_product_out(dec!(1000), Decimal::ZERO, dec!(100000), dec!(0.25));
        assert!(err.is_err());
    }

    #[test]
    fn non_positive_amount_is_an_error() {
        assert!(constant_product_out(Decimal::ZERO, dec!(1), dec!(1), Decimal::ZERO).is_err());
        assert!(constant_product_out(dec!(-5), dec!(1), dec!(1), Decimal::ZERO).is_err());
    }

    #[test]
    fn output_never_exceeds_out_reserve() {
        // even an absurdly large trade asymptotically approaches reserve_out
        let (out, _) =
            constant_product_out(dec!(1000000000), dec!(100000), dec!(100000), dec!(0.25))
                .unwrap();
        assert!(out < dec!(100000));
    }
}
