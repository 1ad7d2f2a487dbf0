//! Job queue - bounded-concurrency execution with retry and rate limiting.
//!
//! Submission enqueues one job per order id; a fixed pool of workers pulls
//! jobs from a shared channel and drives each to a terminal outcome before
//! taking the next. Dedup by order id guarantees at most one in-flight
//! execution per order. Retryable faults back off exponentially up to the
//! attempt limit, then the order is forced into terminal failure so no
//! caller is left without an outcome.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::core::config::QueueConfig;
use crate::core::{Error, Result};
use crate::pipeline::ExecutionPipeline;

/// One unit of queued work: an execution attempt series for one order.
struct Job {
    order_id: String,
}

/// What workers run. The execution pipeline is the production runner;
/// tests substitute stubs.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, order_id: &str) -> Result<()>;

    /// Force the order into terminal failure (exhausted retries, failed
    /// execution start).
    async fn force_fail(&self, order_id: &str, reason: &str, detail: String);
}

#[async_trait]
impl JobRunner for ExecutionPipeline {
    async fn run(&self, order_id: &str) -> Result<()> {
        ExecutionPipeline::run(self, order_id).await
    }

    async fn force_fail(&self, order_id: &str, reason: &str, detail: String) {
        ExecutionPipeline::force_fail(self, order_id, reason, detail).await;
    }
}

/// Queue visibility counters.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub rate_limit: String,
}

#[derive(Default)]
struct Counters {
    waiting: AtomicU64,
    active: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Global cap on job starts per rolling time window, independent of the
/// concurrency limit.
struct RateLimiter {
    max: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    fn new(max: usize, window: Duration) -> Self {
        Self {
            max: max.max(1),
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut starts = self.starts.lock();
                let now = Instant::now();
                while starts
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    starts.pop_front();
                }
                if starts.len() < self.max {
                    starts.push_back(now);
                    None
                } else {
                    starts
                        .front()
                        .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d.max(Duration::from_millis(1))).await,
            }
        }
    }
}

pub struct JobQueue {
    tx: flume::Sender<Job>,
    inflight: Arc<RwLock<HashSet<String>>>,
    counters: Arc<Counters>,
    config: QueueConfig,
}

impl JobQueue {
    /// Spawn the worker pool. Workers run until the queue is dropped and
    /// the channel drains.
    pub fn new(
        config: QueueConfig,
        runner: Arc<dyn JobRunner>,
        broadcaster: Arc<Broadcaster>,
    ) -> Arc<Self> {
        let (tx, rx) = flume::unbounded::<Job>();
        let inflight = Arc::new(RwLock::new(HashSet::new()));
        let counters = Arc::new(Counters::default());
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        ));

        for worker_id in 0..config.concurrency.max(1) {
            let rx = rx.clone();
            let runner = runner.clone();
            let broadcaster = broadcaster.clone();
            let inflight = inflight.clone();
            let counters = counters.clone();
            let limiter = limiter.clone();
            let config = config.clone();
            tokio::spawn(async move {
                worker_loop(
                    worker_id,
                    rx,
                    runner,
                    broadcaster,
                    inflight,
                    counters,
                    limiter,
                    config,
                )
                .await;
            });
        }

        Arc::new(Self {
            tx,
            inflight,
            counters,
            config,
        })
    }

    /// Enqueue one execution for `order_id`. Returns `false` when a job for
    /// the same order is already queued or in flight (dedup key = order id).
    pub fn enqueue(&self, order_id: &str) -> Result<bool> {
        if !self.inflight.write().insert(order_id.to_string()) {
            debug!("duplicate enqueue ignored for order {order_id}");
            return Ok(false);
        }

        self.counters.waiting.fetch_add(1, Ordering::Relaxed);
        if self
            .tx
            .send(Job {
                order_id: order_id.to_string(),
            })
            .is_err()
        {
            self.counters.waiting.fetch_sub(1, Ordering::Relaxed);
            self.inflight.write().remove(order_id);
            return Err(Error::Queue("queue is shut down".into()));
        }

        info!("📥 order {order_id} added to execution queue");
        Ok(true)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            waiting: self.counters.waiting.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rate_limit: format!(
                "{} orders/{}s",
                self.config.rate_limit_max, self.config.rate_limit_window_secs
            ),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    rx: flume::Receiver<Job>,
    runner: Arc<dyn JobRunner>,
    broadcaster: Arc<Broadcaster>,
    inflight: Arc<RwLock<HashSet<String>>>,
    counters: Arc<Counters>,
    limiter: Arc<RateLimiter>,
    config: QueueConfig,
) {
    debug!("worker {worker_id} started");
    while let Ok(job) = rx.recv_async().await {
        // still counted as waiting through the subscriber wait and the
        // rate-limit gate; active means an execution attempt is running
        let started = await_start(&job, runner.as_ref(), &broadcaster, &limiter, &config).await;
        counters.waiting.fetch_sub(1, Ordering::Relaxed);
        if !started {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            inflight.write().remove(&job.order_id);
            continue;
        }

        counters.active.fetch_add(1, Ordering::Relaxed);
        match run_attempts(&job, runner.as_ref(), &config).await {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                info!("🎉 job completed for order {}", job.order_id);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("job failed for order {}: {e}", job.order_id);
            }
        }

        counters.active.fetch_sub(1, Ordering::Relaxed);
        inflight.write().remove(&job.order_id);
    }
    debug!("worker {worker_id} stopped");
}

/// Pre-execution gates. A failed subscriber wait fails the order without
/// consuming a rate-limit slot.
async fn await_start(
    job: &Job,
    runner: &dyn JobRunner,
    broadcaster: &Broadcaster,
    limiter: &RateLimiter,
    config: &QueueConfig,
) -> bool {
    let order_id = &job.order_id;

    if config.subscriber_wait_ms > 0 {
        let timeout = Duration::from_millis(config.subscriber_wait_ms);
        if !broadcaster.wait_for_subscriber(order_id, timeout).await {
            warn!("no subscriber attached for order {order_id} within {timeout:?}");
            runner
                .force_fail(
                    order_id,
                    "execution_start_failed",
                    format!("no subscriber attached within {timeout:?}"),
                )
                .await;
            return false;
        }
    }

    limiter.acquire().await;
    true
}

async fn run_attempts(job: &Job, runner: &dyn JobRunner, config: &QueueConfig) -> Result<()> {
    let order_id = &job.order_id;
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = Duration::from_millis(config.backoff_base_ms);
    loop {
        info!("🚀 processing order {order_id} (attempt {attempt}/{max_attempts})");
        match runner.run(order_id).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!("order {order_id} attempt {attempt} failed: {e}; retrying in {delay:?}");
                tokio::time::sleep(with_jitter(delay)).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    // exhausted: the pipeline never marked the order, do it here
                    error!("order {order_id} failed after {attempt} attempts: {e}");
                    runner
                        .force_fail(order_id, e.reason(), e.to_string())
                        .await;
                } else {
                    // terminal market/state failure: the order is already
                    // marked and its failure event published
                    warn!("order {order_id} failed terminally: {e}");
                }
                return Err(e);
            }
        }
    }
}

/// Up to 10% random jitter so retry bursts from concurrent jobs spread out.
fn with_jitter(delay: Duration) -> Duration {
    delay + delay.mul_f64(rand::random::<f64>() * 0.1)
}
