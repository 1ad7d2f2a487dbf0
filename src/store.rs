//! Order persistence boundary.
//!
//! The core only depends on this trait; the in-memory implementation is the
//! simulation's backend, and a relational or durable-cache store would slot
//! in behind the same contract.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::core::{Order, OrderStatus, Result};

/// Persistence contract: idempotent upsert keyed by order id, plus lookups.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn persist(&self, order: &Order) -> Result<()>;

    async fn load(&self, order_id: &str) -> Result<Option<Order>>;

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    async fn list(&self) -> Result<Vec<Order>>;
}

/// In-memory order store.
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn persist(&self, order: &Order) -> Result<()> {
        self.orders
            .write()
            .insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn load(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(self.orders.read().get(order_id).cloned())
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}
