//! Liquidity venues - a small closed set of constant-product pools.
//!
//! Venues are enum variants, not string switches: adding one means adding a
//! variant and seeding its pool, and the router picks it up by iterating
//! [`VenueId::ALL`].

pub mod pool;
pub mod quote;

pub use pool::{Reserves, SwapCheck, VenuePool, RESERVE_PRECISION};
pub use quote::Quote;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The configured liquidity venues, in fixed priority order. The first
/// listed venue wins routing ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueId {
    Raydium,
    Meteora,
}

impl VenueId {
    pub const ALL: [VenueId; 2] = [VenueId::Raydium, VenueId::Meteora];

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::Raydium => "raydium",
            VenueId::Meteora => "meteora",
        }
    }

    fn index(self) -> usize {
        match self {
            VenueId::Raydium => 0,
            VenueId::Meteora => 1,
        }
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry holding one live pool per venue.
pub struct VenueBook {
    pools: [Arc<VenuePool>; 2],
}

impl VenueBook {
    pub fn new(raydium: VenuePool, meteora: VenuePool) -> Self {
        Self {
            pools: [Arc::new(raydium), Arc::new(meteora)],
        }
    }

    /// The simulation's seed pools.
    pub fn with_defaults() -> Self {
        Self::new(
            VenuePool::new(
                VenueId::Raydium,
                "raydium_1",
                "TOKEN_A",
                "TOKEN_B",
                Decimal::from(100_000),
                Decimal::from(100_000),
                Decimal::new(25, 2), // 0.25%
            ),
            VenuePool::new(
                VenueId::Meteora,
                "meteora_1",
                "TOKEN_A",
                "TOKEN_B",
                Decimal::from(110_000),
                Decimal::from(90_000),
                Decimal::new(20, 2), // 0.20%
            ),
        )
    }

    pub fn get(&self, venue: VenueId) -> &Arc<VenuePool> {
        &self.pools[venue.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_book_seeds_both_pools() {
        let book = VenueBook::with_defaults();
        let raydium = book.get(VenueId::Raydium);
        assert_eq!(raydium.id(), "raydium_1");
        assert_eq!(raydium.fee_pct(), dec!(0.25));
        assert_eq!(raydium.snapshot().reserve_a, dec!(100000));

        let meteora = book.get(VenueId::Meteora);
        assert_eq!(meteora.id(), "meteora_1");
        assert_eq!(meteora.fee_pct(), dec!(0.20));
        assert_eq!(meteora.snapshot().reserve_b, dec!(90000));
    }

    #[test]
    fn venue_priority_order_is_fixed() {
        assert_eq!(VenueId::ALL[0], VenueId::Raydium);
        assert_eq!(VenueId::Raydium.to_string(), "raydium");
    }
}
