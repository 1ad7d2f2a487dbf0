//! Event broadcast - delivers stage events to per-order subscribers.
//!
//! The broadcaster is an explicit, injected component with a typed
//! interface; the pipeline publishes through [`EventSink`] and never waits
//! for delivery. Publishing with no subscriber attached is a no-op.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::core::{Fill, OrderStatus};
use crate::router::RouteDecision;
use crate::venue::Reserves;

/// Slippage diagnostics carried on a `slippage_exceeded` failure.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlippageReport {
    pub expected_out: Decimal,
    pub actual_out: Decimal,
    pub min_acceptable_out: Decimal,
}

/// Stage-specific event payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    StatusOnly,
    Wrapped {
        amount: Decimal,
        original_amount: Decimal,
    },
    Unwrapped {
        amount: Decimal,
        wrapped_amount: Decimal,
    },
    Routed {
        route: RouteDecision,
    },
    Submitted {
        tx_ref: String,
        pool_id: String,
        reserves: Reserves,
    },
    Confirmed {
        tx_ref: Option<String>,
        fill: Fill,
        avg_price: Decimal,
    },
    Failed {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        slippage: Option<SlippageReport>,
    },
}

/// One order lifecycle event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl OrderEvent {
    pub fn new(
        order_id: impl Into<String>,
        status: OrderStatus,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            message: message.into(),
            timestamp,
            payload,
        }
    }

    /// Terminal failure event for an order that may not even exist in the
    /// store. Used so no subscriber is ever left without an outcome.
    pub fn terminal_failure(order_id: impl Into<String>, reason: &str, detail: Option<String>) -> Self {
        Self::new(
            order_id,
            OrderStatus::Failed,
            format!("Order failed: {reason}"),
            Utc::now(),
            EventPayload::Failed {
                reason: reason.to_string(),
                detail,
                slippage: None,
            },
        )
    }
}

/// Receiving half handed to a subscriber.
pub type OrderEventReceiver = flume::Receiver<OrderEvent>;

/// Outbound event contract: fire-and-forget publication.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: OrderEvent);
}

/// Fans events out to whichever subscribers registered for the order id.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<String, Vec<flume::Sender<OrderEvent>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a subscriber for `order_id`; events arrive on the returned
    /// channel. Multiple subscribers per order are allowed.
    pub fn register(&self, order_id: &str) -> flume::Receiver<OrderEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers
            .write()
            .entry(order_id.to_string())
            .or_default()
            .push(tx);
        debug!("subscriber registered for order {order_id}");
        rx
    }

    /// Drop all subscribers for `order_id`.
    pub fn unregister(&self, order_id: &str) {
        self.subscribers.write().remove(order_id);
    }

    pub fn has_subscribers(&self, order_id: &str) -> bool {
        self.subscribers
            .read()
            .get(order_id)
            .is_some_and(|senders| senders.iter().any(|tx| !tx.is_disconnected()))
    }

    /// Wait until a subscriber attaches for `order_id`, up to `timeout`.
    /// Returns `false` on timeout.
    pub async fn wait_for_subscriber(&self, order_id: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.has_subscribers(order_id) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for Broadcaster {
    fn publish(&self, event: OrderEvent) {
        let mut subs = self.subscribers.write();
        let Some(senders) = subs.get_mut(&event.order_id) else {
            debug!("no subscribers for order {}", event.order_id);
            return;
        };
        // unbounded channel: send never blocks; dead receivers are pruned
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        if senders.is_empty() {
            let order_id = event.order_id.clone();
            subs.remove(&order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(order_id: &str) -> OrderEvent {
        OrderEvent::new(
            order_id,
            OrderStatus::Pending,
            "Order processing started",
            Utc::now(),
            EventPayload::StatusOnly,
        )
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let b = Broadcaster::new();
        b.publish(event("order_x")); // must not panic or block
        assert!(!b.has_subscribers("order_x"));
    }

    #[test]
    fn registered_subscriber_receives_events() {
        let b = Broadcaster::new();
        let rx = b.register("order_x");
        b.publish(event("order_x"));
        b.publish(event("order_y")); // different order, not delivered

        let got = rx.try_recv().unwrap();
        assert_eq!(got.order_id, "order_x");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unregister_stops_delivery() {
        let b = Broadcaster::new();
        let rx = b.register("order_x");
        b.unregister("order_x");
        b.publish(event("order_x"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let b = Broadcaster::new();
        let rx = b.register("order_x");
        drop(rx);
        b.publish(event("order_x"));
        assert!(!b.has_subscribers("order_x"));
    }

    #[tokio::test]
    async fn wait_for_subscriber_sees_late_attach() {
        let b = std::sync::Arc::new(Broadcaster::new());
        let waiter = b.clone();
        let handle = tokio::spawn(async move {
            waiter
                .wait_for_subscriber("order_x", Duration::from_millis(500))
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _rx = b.register("order_x");
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn wait_for_subscriber_times_out() {
        let b = Broadcaster::new();
        assert!(
            !b.wait_for_subscriber("order_x", Duration::from_millis(60))
                .await
        );
    }

    #[test]
    fn failure_events_serialize_with_reason() {
        let e = OrderEvent::terminal_failure("order_x", "no_liquidity", None);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "no_liquidity");
        assert_eq!(json["type"], "failed");
    }
}
