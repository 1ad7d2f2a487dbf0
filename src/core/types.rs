//! Core types - orders, fills, and the lifecycle status enum.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{Error, Result};
use crate::router::RouteDecision;
use crate::venue::VenueId;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order lifecycle status.
///
/// Forward order is strict: `Created → Queued → Pending → Routing → Routed →
/// Building → Submitted → Confirmed`, with `Failed` reachable from any
/// non-terminal state. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Queued,
    Pending,
    Routing,
    Routed,
    Building,
    Submitted,
    Confirmed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Legal forward transitions. `Created → Pending` is allowed for the
    /// direct (non-queued) execution path.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == OrderStatus::Failed {
            return true;
        }
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::Queued)
                | (OrderStatus::Created, OrderStatus::Pending)
                | (OrderStatus::Queued, OrderStatus::Pending)
                | (OrderStatus::Pending, OrderStatus::Routing)
                | (OrderStatus::Routing, OrderStatus::Routed)
                | (OrderStatus::Routed, OrderStatus::Building)
                | (OrderStatus::Building, OrderStatus::Submitted)
                | (OrderStatus::Submitted, OrderStatus::Confirmed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Created => "created",
            OrderStatus::Queued => "queued",
            OrderStatus::Pending => "pending",
            OrderStatus::Routing => "routing",
            OrderStatus::Routed => "routed",
            OrderStatus::Building => "building",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One realized swap execution. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub venue: VenueId,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Inbound order submission payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderPayload {
    pub base_token: String,
    pub quote_token: String,
    pub side: Side,
    pub amount: Decimal,
    pub slippage_pct: Option<Decimal>,
    pub client_id: Option<String>,
}

/// A market order and its accumulated execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub side: Side,
    pub base_token: String,
    pub quote_token: String,
    pub amount: Decimal,
    pub slippage_pct: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fills: Vec<Fill>,
    pub client_id: Option<String>,
    pub route: Option<RouteDecision>,
    pub tx_ref: Option<String>,
    pub failure_reason: Option<String>,
}

/// Maximum percent degradation from expected output tolerated by default.
pub fn default_slippage_pct() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

impl Order {
    pub fn new(payload: CreateOrderPayload) -> Self {
        let now = Utc::now();
        Self {
            id: format!("order_{}", Uuid::new_v4()),
            side: payload.side,
            base_token: payload.base_token,
            quote_token: payload.quote_token,
            amount: payload.amount,
            slippage_pct: payload.slippage_pct.unwrap_or_else(default_slippage_pct),
            status: OrderStatus::Created,
            created_at: now,
            updated_at: now,
            fills: Vec::new(),
            client_id: payload.client_id,
            route: None,
            tx_ref: None,
            failure_reason: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Advance to `next`, enforcing the strict forward order.
    pub fn transition(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(Error::InvalidState(format!(
                "illegal transition {} -> {} for order {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Restart a (re)tried execution at `Pending`. The forward-only rule
    /// holds within one attempt; a fresh attempt re-enters here.
    pub fn begin_attempt(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "order {} already terminal ({})",
                self.id, self.status
            )));
        }
        self.status = OrderStatus::Pending;
        self.touch();
        Ok(())
    }

    /// Mark terminally failed with a recorded reason. No-op when already
    /// terminal, so a failure is only ever recorded once.
    pub fn fail(&mut self, reason: &str) {
        if self.status.is_terminal() {
            return;
        }
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.touch();
    }
}

/// Native token symbol; trades wrap it 1:1 before touching a pool.
pub const NATIVE_SOL: &str = "SOL";
pub const WRAPPED_SOL: &str = "WSOL";

pub fn is_native_sol(token: &str) -> bool {
    token.eq_ignore_ascii_case(NATIVE_SOL)
}

/// Wrapping is 1:1 in the simulation.
pub fn wrap_native(amount: Decimal) -> Decimal {
    amount
}

pub fn unwrap_native(amount: Decimal) -> Decimal {
    amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(CreateOrderPayload {
            base_token: "TOKEN_A".into(),
            quote_token: "TOKEN_B".into(),
            side: Side::Buy,
            amount: dec!(1000),
            slippage_pct: None,
            client_id: None,
        })
    }

    #[test]
    fn new_order_defaults() {
        let o = order();
        assert!(o.id.starts_with("order_"));
        assert_eq!(o.status, OrderStatus::Created);
        assert_eq!(o.slippage_pct, dec!(0.5));
        assert!(o.fills.is_empty());
        assert!(o.updated_at >= o.created_at);
    }

    #[test]
    fn transitions_are_forward_only() {
        let mut o = order();
        o.transition(OrderStatus::Queued).unwrap();
        o.transition(OrderStatus::Pending).unwrap();
        o.transition(OrderStatus::Routing).unwrap();
        // no skipping
        assert!(o.transition(OrderStatus::Submitted).is_err());
        // no going back
        assert!(o.transition(OrderStatus::Pending).is_err());
        o.transition(OrderStatus::Routed).unwrap();
        o.transition(OrderStatus::Building).unwrap();
        o.transition(OrderStatus::Submitted).unwrap();
        o.transition(OrderStatus::Confirmed).unwrap();
        assert!(o.status.is_terminal());
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        let mut o = order();
        o.transition(OrderStatus::Queued).unwrap();
        o.transition(OrderStatus::Pending).unwrap();
        o.fail("no_liquidity");
        assert_eq!(o.status, OrderStatus::Failed);
        assert_eq!(o.failure_reason.as_deref(), Some("no_liquidity"));
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut o = order();
        o.fail("execution_error");
        assert!(o.transition(OrderStatus::Pending).is_err());
        assert!(o.begin_attempt().is_err());
        // a second fail keeps the original reason
        o.fail("slippage_exceeded");
        assert_eq!(o.failure_reason.as_deref(), Some("execution_error"));
    }

    #[test]
    fn retry_re_enters_at_pending() {
        let mut o = order();
        o.transition(OrderStatus::Queued).unwrap();
        o.transition(OrderStatus::Pending).unwrap();
        o.transition(OrderStatus::Routing).unwrap();
        o.begin_attempt().unwrap();
        assert_eq!(o.status, OrderStatus::Pending);
    }

    #[test]
    fn native_token_detection() {
        assert!(is_native_sol("SOL"));
        assert!(is_native_sol("sol"));
        assert!(!is_native_sol("WSOL"));
        assert_eq!(wrap_native(dec!(5)), dec!(5));
    }
}
