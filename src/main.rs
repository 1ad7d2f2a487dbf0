use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use dexflow::broadcast::Broadcaster;
use dexflow::core::{CreateOrderPayload, Side};
use dexflow::pipeline::ExecutionPipeline;
use dexflow::queue::JobQueue;
use dexflow::service::OrderService;
use dexflow::store::{InMemoryOrderStore, OrderStore};
use dexflow::venue::VenueBook;
use dexflow::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logger
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dexflow=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    tracing::info!("🦀 DexFlow starting (Simulated DEX Execution Engine)...");

    let config = AppConfig::load_default();

    // 2. Wire the engine: store, venues, broadcaster, pipeline, queue
    let store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
    let venues = Arc::new(VenueBook::with_defaults());
    let broadcaster = Arc::new(Broadcaster::new());
    let pipeline = Arc::new(ExecutionPipeline::new(
        store.clone(),
        venues.clone(),
        broadcaster.clone(),
        config.pipeline.clone(),
    ));
    let queue = JobQueue::new(config.queue.clone(), pipeline, broadcaster.clone());
    let service = OrderService::new(store, broadcaster, queue);

    // 3. Submit a demo order and follow it to a terminal state
    let order_id = service
        .submit_order(CreateOrderPayload {
            base_token: "SOL".into(),
            quote_token: "USDC".into(),
            side: Side::Buy,
            amount: Decimal::from(1000),
            slippage_pct: None,
            client_id: Some("demo".into()),
        })
        .await?;
    tracing::info!("submitted demo order {order_id}");

    let events = service.subscribe(&order_id);
    while let Ok(event) = events.recv_async().await {
        tracing::info!(
            "event: [{}] {} - {}",
            event.status,
            event.order_id,
            event.message
        );
        if event.status.is_terminal() {
            break;
        }
    }

    let order = service.get_order(&order_id).await?;
    tracing::info!(
        "final: status={} fills={} tx_ref={:?}",
        order.status,
        order.fills.len(),
        order.tx_ref
    );
    let stats = service.queue_stats();
    tracing::info!(
        "queue: completed={} failed={} ({})",
        stats.completed,
        stats.failed,
        stats.rate_limit
    );

    Ok(())
}
