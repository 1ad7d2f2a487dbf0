//! Venue routing - quotes every venue, picks the best expected output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::core::{Error, Result};
use crate::venue::{Quote, VenueBook, VenueId};

/// Auditable routing decision: every venue's quote plus the winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub quotes: Vec<Quote>,
    pub chosen: VenueId,
    pub timestamp: DateTime<Utc>,
}

impl RouteDecision {
    /// The winning quote. Present by construction; `None` only if the
    /// decision was deserialized from inconsistent data.
    pub fn best(&self) -> Option<&Quote> {
        self.quotes.iter().find(|q| q.venue == self.chosen)
    }
}

/// Quote all venues with the same input and select the strictly greater
/// expected output; ties go to the first-listed venue.
///
/// A venue failing to quote makes that venue unavailable, not the router:
/// routing succeeds as long as one venue quotes. All failing is
/// [`Error::NoLiquidity`].
pub fn find_best_route(book: &VenueBook, amount_in: Decimal) -> Result<RouteDecision> {
    let mut quotes = Vec::with_capacity(VenueId::ALL.len());

    for venue in VenueId::ALL {
        match book.get(venue).quote(amount_in) {
            Ok(q) => {
                debug!("{} => {:.6}", venue, q.expected_out);
                quotes.push(q);
            }
            Err(e) => warn!("venue {venue} unavailable for quote: {e}"),
        }
    }

    let mut best: Option<&Quote> = None;
    for q in &quotes {
        match best {
            Some(b) if q.expected_out <= b.expected_out => {}
            _ => best = Some(q),
        }
    }
    let chosen = match best {
        Some(q) => q.venue,
        None => return Err(Error::NoLiquidity),
    };

    info!(
        "routing decision: {} quote(s), selected {}",
        quotes.len(),
        chosen
    );

    Ok(RouteDecision {
        quotes,
        chosen,
        timestamp: Utc::now(),
    })
}
