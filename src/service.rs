//! Order service - the submission surface in front of the queue.
//!
//! Validates payloads, persists the order, and hands it to the job queue.
//! Submission returns as soon as the order is queued; execution progress is
//! observed through the broadcaster or by polling the store.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::broadcast::{Broadcaster, EventPayload, EventSink, OrderEvent, OrderEventReceiver};
use crate::core::{CreateOrderPayload, Error, Order, OrderStatus, Result};
use crate::queue::{JobQueue, QueueStats};
use crate::store::OrderStore;

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    broadcaster: Arc<Broadcaster>,
    queue: Arc<JobQueue>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        broadcaster: Arc<Broadcaster>,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            queue,
        }
    }

    /// Accept a new market order. Returns the generated order id once the
    /// order is persisted and queued for execution.
    pub async fn submit_order(&self, payload: CreateOrderPayload) -> Result<String> {
        validate(&payload)?;

        let mut order = Order::new(payload);
        let order_id = order.id.clone();
        self.store.persist(&order).await?;

        order.transition(OrderStatus::Queued)?;
        self.store.persist(&order).await?;
        self.broadcaster.publish(OrderEvent::new(
            &order.id,
            order.status,
            "Order accepted and queued for execution",
            order.updated_at,
            EventPayload::StatusOnly,
        ));
        self.queue.enqueue(&order_id)?;

        info!(
            "order {order_id} accepted: {} {} -> {} (slippage {}%)",
            order.amount, order.base_token, order.quote_token, order.slippage_pct
        );
        Ok(order_id)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.store
            .load(order_id)
            .await?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.store.list().await
    }

    pub async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.store.list_by_status(status).await
    }

    /// Attach a lifecycle event subscriber for `order_id`.
    pub fn subscribe(&self, order_id: &str) -> OrderEventReceiver {
        self.broadcaster.register(order_id)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

fn validate(payload: &CreateOrderPayload) -> Result<()> {
    if payload.amount <= Decimal::ZERO {
        return Err(Error::Validation("amount must be positive".into()));
    }
    if payload.base_token.trim().is_empty() || payload.quote_token.trim().is_empty() {
        return Err(Error::Validation("token symbols must be non-empty".into()));
    }
    if payload.base_token.trim().eq_ignore_ascii_case(payload.quote_token.trim()) {
        return Err(Error::Validation(
            "base and quote tokens must differ".into(),
        ));
    }
    if let Some(slippage) = payload.slippage_pct {
        if slippage < Decimal::ZERO || slippage >= Decimal::ONE_HUNDRED {
            return Err(Error::Validation(
                "slippage_pct must be in [0, 100)".into(),
            ));
        }
    }
    Ok(())
}
