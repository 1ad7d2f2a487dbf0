//! Venue pool - live reserves behind a per-pool lock.
//!
//! Swap application is the only operation that mutates reserves, and it is
//! serialized per pool: quote, tolerance check, and reserve update happen
//! under one lock so concurrent orders against the same pool always observe
//! a sequentially consistent reserve history.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::venue::quote::{constant_product_out, Quote};
use crate::venue::VenueId;

/// Reserves are rounded to this many decimal places after every swap to
/// keep drift bounded.
pub const RESERVE_PRECISION: u32 = 6;

/// Point-in-time reserve levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Reserves {
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
}

/// Outcome of a checked swap application.
#[derive(Debug, Clone, Copy)]
pub enum SwapCheck {
    /// Swap applied; reserves were mutated.
    Applied { amount_out: Decimal },
    /// Fresh output fell below the caller's minimum; reserves untouched.
    Rejected { amount_out: Decimal },
}

/// One liquidity venue's constant-product pool.
pub struct VenuePool {
    id: String,
    venue: VenueId,
    token_a: String,
    token_b: String,
    fee_pct: Decimal,
    reserves: Mutex<Reserves>,
}

impl VenuePool {
    pub fn new(
        venue: VenueId,
        id: impl Into<String>,
        token_a: impl Into<String>,
        token_b: impl Into<String>,
        reserve_a: Decimal,
        reserve_b: Decimal,
        fee_pct: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            venue,
            token_a: token_a.into(),
            token_b: token_b.into(),
            fee_pct,
            reserves: Mutex::new(Reserves { reserve_a, reserve_b }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn venue(&self) -> VenueId {
        self.venue
    }

    pub fn token_a(&self) -> &str {
        &self.token_a
    }

    pub fn token_b(&self) -> &str {
        &self.token_b
    }

    pub fn fee_pct(&self) -> Decimal {
        self.fee_pct
    }

    pub fn snapshot(&self) -> Reserves {
        *self.reserves.lock()
    }

    /// Quote `amount_in` against current reserves. Read-only; the result may
    /// already be stale by the time the caller acts on it.
    pub fn quote(&self, amount_in: Decimal) -> Result<Quote> {
        let r = self.reserves.lock();
        let (expected_out, price_impact_pct) =
            constant_product_out(amount_in, r.reserve_a, r.reserve_b, self.fee_pct)?;
        Ok(Quote {
            venue: self.venue,
            expected_out,
            price_impact_pct,
            fee_pct: self.fee_pct,
        })
    }

    /// Quote-then-check-then-apply under one lock.
    ///
    /// Re-quotes against live reserves, and only if the fresh output clears
    /// `min_out` mutates them: `reserve_a += amount_after_fee`,
    /// `reserve_b -= amount_out`, both rounded to [`RESERVE_PRECISION`].
    /// A rejected swap leaves the pool exactly as it was.
    pub fn swap_checked(&self, amount_in: Decimal, min_out: Decimal) -> Result<SwapCheck> {
        let mut r = self.reserves.lock();
        let (out, _) = constant_product_out(amount_in, r.reserve_a, r.reserve_b, self.fee_pct)?;
        let amount_out = out.round_dp(RESERVE_PRECISION);

        if amount_out < min_out {
            return Ok(SwapCheck::Rejected { amount_out });
        }

        let amount_after_fee = amount_in * (Decimal::ONE - self.fee_pct / Decimal::ONE_HUNDRED);
        r.reserve_a = (r.reserve_a + amount_after_fee).round_dp(RESERVE_PRECISION);
        r.reserve_b = (r.reserve_b - amount_out).round_dp(RESERVE_PRECISION);

        Ok(SwapCheck::Applied { amount_out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pool() -> VenuePool {
        VenuePool::new(
            VenueId::Raydium,
            "raydium_1",
            "TOKEN_A",
            "TOKEN_B",
            dec!(100000),
            dec!(100000),
            dec!(0.25),
        )
    }

    fn applied(check: SwapCheck) -> Decimal {
        match check {
            SwapCheck::Applied { amount_out } => amount_out,
            SwapCheck::Rejected { .. } => panic!("swap unexpectedly rejected"),
        }
    }

    #[test]
    fn swap_mutates_reserves() {
        let p = pool();
        let out = applied(p.swap_checked(dec!(1000), Decimal::ZERO).unwrap());
        assert!((out - dec!(987.648202)).abs() < dec!(0.0001), "out = {out}");
        let r = p.snapshot();
        assert_eq!(r.reserve_a, dec!(100997.5));
        assert!((r.reserve_b - dec!(99012.351798)).abs() < dec!(0.0001));
    }

    #[test]
    fn swap_application_is_not_idempotent() {
        let p = pool();
        let first = applied(p.swap_checked(dec!(1000), Decimal::ZERO).unwrap());
        let after_first = p.snapshot();
        let second = applied(p.swap_checked(dec!(1000), Decimal::ZERO).unwrap());
        let after_second = p.snapshot();

        // the second identical swap moves reserves again and gets less out
        assert!(after_second.reserve_a > after_first.reserve_a);
        assert!(after_second.reserve_b < after_first.reserve_b);
        assert!(second < first);
    }

    #[test]
    fn reserves_never_go_negative() {
        let p = pool();
        // sell the entire input reserve at once
        let out = applied(p.swap_checked(dec!(100000), Decimal::ZERO).unwrap());
        let r = p.snapshot();
        assert!(out < dec!(100000));
        assert!(r.reserve_a > Decimal::ZERO);
        assert!(r.reserve_b > Decimal::ZERO);
    }

    #[test]
    fn product_does_not_increase_beyond_rounding() {
        let p = pool();
        let before = p.snapshot();
        let k_before = before.reserve_a * before.reserve_b;
        applied(p.swap_checked(dec!(1000), Decimal::ZERO).unwrap());
        let after = p.snapshot();
        let k_after = after.reserve_a * after.reserve_b;
        // fee revenue is not reinvested, so the invariant product is
        // preserved up to reserve rounding, never grown
        assert!(k_after <= k_before + dec!(1));
        assert!((k_after - k_before).abs() / k_before < dec!(0.000001));
    }

    #[test]
    fn rejected_swap_leaves_reserves_untouched() {
        let p = pool();
        let before = p.snapshot();
        let check = p.swap_checked(dec!(1000), dec!(999999)).unwrap();
        match check {
            SwapCheck::Rejected { amount_out } => assert!(amount_out < dec!(999999)),
            SwapCheck::Applied { .. } => panic!("swap should have been rejected"),
        }
        let after = p.snapshot();
        assert_eq!(before.reserve_a, after.reserve_a);
        assert_eq!(before.reserve_b, after.reserve_b);
    }

    #[test]
    fn quote_is_read_only() {
        let p = pool();
        let before = p.snapshot();
        let q = p.quote(dec!(1000)).unwrap();
        assert_eq!(q.venue, VenueId::Raydium);
        let after = p.snapshot();
        assert_eq!(before.reserve_a, after.reserve_a);
        assert_eq!(before.reserve_b, after.reserve_b);
    }
}
