//! Error handling - hierarchical errors for the execution core.

use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// dexflow error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before a job was created — caller's fault
    #[error("validation error: {0}")]
    Validation(String),

    /// Order id does not resolve to a stored order
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Every configured venue failed to produce a usable quote
    #[error("no liquidity: no venue produced a usable quote")]
    NoLiquidity,

    /// Realized output fell below the submitter's tolerance
    #[error("slippage exceeded: expected {expected}, actual {actual}, min acceptable {min_acceptable}")]
    SlippageExceeded {
        expected: Decimal,
        actual: Decimal,
        min_acceptable: Decimal,
    },

    /// Venue-level fault (empty reserves, bad input amount)
    #[error("venue error: {0}")]
    Venue(String),

    /// Illegal order state transition
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Persistence layer fault
    #[error("store error: {0}")]
    Store(String),

    /// Queue coordination fault
    #[error("queue error: {0}")]
    Queue(String),

    /// Unexpected fault during execution
    #[error("execution error: {0}")]
    Execution(String),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the job queue should retry after this failure.
    ///
    /// Market-state failures (slippage, no liquidity) reflect reserves, not
    /// transient infrastructure, so retrying them only burns attempts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Execution(_) | Error::Store(_))
    }

    /// Stable machine-readable failure reason for events and order records.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::OrderNotFound(_) => "order_not_found",
            Error::NoLiquidity => "no_liquidity",
            Error::SlippageExceeded { .. } => "slippage_exceeded",
            Error::Queue(_) => "queue_failed",
            Error::Venue(_)
            | Error::InvalidState(_)
            | Error::Store(_)
            | Error::Execution(_)
            | Error::Config(_)
            | Error::Serialization(_) => "execution_error",
        }
    }
}
