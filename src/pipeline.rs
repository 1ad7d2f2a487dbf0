//! Execution pipeline - the order state machine.
//!
//! Advances one order through its staged lifecycle, persisting and
//! publishing after every transition. Market-state failures (no liquidity,
//! slippage) are terminal here: the order is marked failed and exactly one
//! failure event goes out before the error returns. Unexpected faults
//! propagate without a terminal transition so the job queue can retry.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broadcast::{EventPayload, EventSink, OrderEvent, SlippageReport};
use crate::core::config::PipelineConfig;
use crate::core::{
    is_native_sol, unwrap_native, wrap_native, Error, Fill, Order, OrderStatus, Result,
};
use crate::router::find_best_route;
use crate::store::OrderStore;
use crate::venue::{SwapCheck, VenueBook, VenueId, VenuePool, RESERVE_PRECISION};

pub struct ExecutionPipeline {
    store: Arc<dyn OrderStore>,
    venues: Arc<VenueBook>,
    events: Arc<dyn EventSink>,
    config: PipelineConfig,
}

impl ExecutionPipeline {
    pub fn new(
        store: Arc<dyn OrderStore>,
        venues: Arc<VenueBook>,
        events: Arc<dyn EventSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            venues,
            events,
            config,
        }
    }

    /// Run one execution attempt for `order_id` to a terminal outcome or a
    /// retryable error.
    pub async fn run(&self, order_id: &str) -> Result<()> {
        info!("starting execution for order {order_id}");

        let Some(mut order) = self.store.load(order_id).await? else {
            // nothing to persist, but a subscriber may be waiting on an outcome
            self.events.publish(OrderEvent::terminal_failure(
                order_id,
                "order_not_found",
                None,
            ));
            return Err(Error::OrderNotFound(order_id.to_string()));
        };
        if order.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "order {} already {}",
                order.id, order.status
            )));
        }

        // stage: pending
        order.begin_attempt()?;
        self.save_and_publish(&order, "Order processing started", EventPayload::StatusOnly)
            .await?;
        self.pause(self.config.stage_delay_ms).await;

        // native-token wrap (1:1 in the simulation)
        let needs_unwrap = is_native_sol(&order.base_token);
        let trade_amount = if needs_unwrap {
            let wrapped = wrap_native(order.amount);
            self.events.publish(OrderEvent::new(
                &order.id,
                order.status,
                format!("Wrapped {} SOL to {} WSOL", order.amount, wrapped),
                Utc::now(),
                EventPayload::Wrapped {
                    amount: wrapped,
                    original_amount: order.amount,
                },
            ));
            self.pause(self.config.stage_delay_ms).await;
            wrapped
        } else {
            order.amount
        };

        // stage: routing
        order.transition(OrderStatus::Routing)?;
        self.save_and_publish(
            &order,
            "Fetching quotes from all venues",
            EventPayload::StatusOnly,
        )
        .await?;
        self.pause(self.config.stage_delay_ms).await;

        let decision = match find_best_route(&self.venues, trade_amount) {
            Ok(decision) => decision,
            Err(e @ Error::NoLiquidity) => return self.fail_terminal(&mut order, e).await,
            Err(e) => return Err(e),
        };
        let best = decision
            .best()
            .cloned()
            .ok_or_else(|| Error::Execution("routing decision missing winning quote".into()))?;
        order.route = Some(decision.clone());
        order.transition(OrderStatus::Routed)?;
        self.save_and_publish(
            &order,
            format!("Best route found via {}", best.venue),
            EventPayload::Routed { route: decision },
        )
        .await?;
        self.pause(self.config.stage_delay_ms).await;

        // stage: building
        order.transition(OrderStatus::Building)?;
        self.save_and_publish(&order, "Building transaction", EventPayload::StatusOnly)
            .await?;
        self.pause(self.config.stage_delay_ms).await;

        // stage: submission with slippage enforcement. The tolerance is
        // anchored to the routing-time quote; the pool re-quotes live
        // reserves and applies only if the fresh output still clears it,
        // so a rejected attempt never moves the pool.
        let expected_out = best.expected_out;
        let min_acceptable_out = (expected_out
            * (Decimal::ONE - order.slippage_pct / Decimal::ONE_HUNDRED))
            .round_dp(RESERVE_PRECISION);
        let pool = self.venues.get(best.venue);

        let actual_out = match pool.swap_checked(trade_amount, min_acceptable_out)? {
            SwapCheck::Applied { amount_out } => amount_out,
            SwapCheck::Rejected { amount_out } => {
                warn!(
                    "order {} slippage exceeded: expected {}, actual {}, min {}",
                    order.id, expected_out, amount_out, min_acceptable_out
                );
                let err = Error::SlippageExceeded {
                    expected: expected_out,
                    actual: amount_out,
                    min_acceptable: min_acceptable_out,
                };
                return self.fail_terminal(&mut order, err).await;
            }
        };

        // swap applied: a fault past this point is terminal, never retried.
        // A retried attempt would route again and apply a second swap.
        if let Err(e) = self
            .settle(&mut order, best.venue, pool, actual_out, needs_unwrap)
            .await
        {
            return self.fail_settled(&mut order, e).await;
        }
        Ok(())
    }

    /// Post-swap stages: submission record, optional unwrap, fill,
    /// confirmation.
    async fn settle(
        &self,
        order: &mut Order,
        venue: VenueId,
        pool: &VenuePool,
        actual_out: Decimal,
        needs_unwrap: bool,
    ) -> Result<()> {
        let tx_ref = mock_tx_ref();
        order.tx_ref = Some(tx_ref.clone());
        order.transition(OrderStatus::Submitted)?;
        self.save_and_publish(
            order,
            "Transaction submitted to network",
            EventPayload::Submitted {
                tx_ref,
                pool_id: pool.id().to_string(),
                reserves: pool.snapshot(),
            },
        )
        .await?;
        self.pause(self.config.confirm_delay_ms).await;

        // native-token unwrap
        let amount_out = if needs_unwrap {
            let unwrapped = unwrap_native(actual_out);
            self.events.publish(OrderEvent::new(
                &order.id,
                order.status,
                format!("Unwrapped {actual_out} WSOL to {unwrapped} SOL"),
                Utc::now(),
                EventPayload::Unwrapped {
                    amount: unwrapped,
                    wrapped_amount: actual_out,
                },
            ));
            self.pause(self.config.stage_delay_ms).await;
            unwrapped
        } else {
            actual_out
        };

        // stage: confirmation
        let fill = Fill {
            venue,
            amount_in: order.amount,
            amount_out,
            timestamp: Utc::now(),
        };
        order.fills.push(fill.clone());
        order.transition(OrderStatus::Confirmed)?;
        let avg_price = (amount_out / order.amount).round_dp(RESERVE_PRECISION);
        self.save_and_publish(
            order,
            "Order completed successfully",
            EventPayload::Confirmed {
                tx_ref: order.tx_ref.clone(),
                fill,
                avg_price,
            },
        )
        .await?;

        info!("order {} confirmed, avg price {avg_price}", order.id);
        Ok(())
    }

    /// Terminal failure after the swap has been applied. The returned error
    /// is never retryable: a second attempt would re-route and re-apply the
    /// swap against already-moved reserves.
    async fn fail_settled(&self, order: &mut Order, err: Error) -> Result<()> {
        warn!("order {} faulted after swap application: {err}", order.id);
        if !order.status.is_terminal() {
            order.fail(err.reason());
        }
        if let Err(persist_err) = self.store.persist(order).await {
            warn!(
                "failed to persist order {} after settlement fault: {persist_err}",
                order.id
            );
        }
        if order.status == OrderStatus::Failed {
            self.events.publish(OrderEvent::terminal_failure(
                &order.id,
                err.reason(),
                Some(err.to_string()),
            ));
        }
        Err(Error::Queue(format!(
            "order {} failed after swap application: {err}",
            order.id
        )))
    }

    /// Force an order into terminal failure from outside a run — used by the
    /// queue on exhausted retries or a failed execution start. Leaves orders
    /// that already reached a terminal state alone.
    pub async fn force_fail(&self, order_id: &str, reason: &str, detail: impl Into<String>) {
        let detail = detail.into();
        match self.store.load(order_id).await {
            Ok(Some(mut order)) if !order.status.is_terminal() => {
                order.fail(reason);
                if let Err(e) = self.store.persist(&order).await {
                    warn!("failed to persist forced failure of order {order_id}: {e}");
                }
                self.events.publish(OrderEvent::terminal_failure(
                    order_id,
                    reason,
                    Some(detail),
                ));
            }
            Ok(Some(_)) => {} // already terminal; its failure event was published
            Ok(None) => {
                self.events.publish(OrderEvent::terminal_failure(
                    order_id,
                    reason,
                    Some(detail),
                ));
            }
            Err(e) => warn!("failed to load order {order_id} for forced failure: {e}"),
        }
    }

    /// Terminal failure inside a run: mark, persist, publish exactly one
    /// failure event, then surface the original error.
    async fn fail_terminal(&self, order: &mut Order, err: Error) -> Result<()> {
        let reason = err.reason();
        order.fail(reason);
        if let Err(persist_err) = self.store.persist(order).await {
            // never mask the original failure with a persistence fault
            warn!("failed to persist failure of order {}: {persist_err}", order.id);
        }

        let slippage = match &err {
            Error::SlippageExceeded {
                expected,
                actual,
                min_acceptable,
            } => Some(SlippageReport {
                expected_out: *expected,
                actual_out: *actual,
                min_acceptable_out: *min_acceptable,
            }),
            _ => None,
        };
        self.events.publish(OrderEvent::new(
            &order.id,
            OrderStatus::Failed,
            format!("Order failed: {reason}"),
            order.updated_at,
            EventPayload::Failed {
                reason: reason.to_string(),
                detail: Some(err.to_string()),
                slippage,
            },
        ));

        Err(err)
    }

    async fn save_and_publish(
        &self,
        order: &Order,
        message: impl Into<String>,
        payload: EventPayload,
    ) -> Result<()> {
        self.store.persist(order).await?;
        self.events.publish(OrderEvent::new(
            &order.id,
            order.status,
            message,
            order.updated_at,
            payload,
        ));
        Ok(())
    }

    async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

fn mock_tx_ref() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("mock_tx_{}", &uuid[..8])
}
