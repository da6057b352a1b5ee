//! Error types for the tickmatch batch auction core.
//!
//! All errors use the `DEX_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Decimal arithmetic
//! - 2xx: Tick grid
//! - 3xx: Order book
//! - 4xx: Pools
//! - 5xx: Matching / structural invariants
//! - 9xx: Configuration / serialization

use thiserror::Error;

use crate::{OrderId, PoolId};

/// Central error enum for all tickmatch operations.
///
/// `Unmatchable` and rounding exclusions are normal batch outcomes and live
/// in [`MatchOutcome`](crate::MatchOutcome) / [`ExcludedOrder`](crate::ExcludedOrder),
/// not here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DexError {
    // =================================================================
    // Decimal Errors (1xx)
    // =================================================================
    /// Malformed or out-of-domain input (bad decimal text, misaligned
    /// price, negative sqrt operand, non-positive tick price).
    #[error("DEX_ERR_100: Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A decimal result needs more than the maximum bit length.
    #[error("DEX_ERR_101: Decimal overflow in {op}")]
    Overflow { op: &'static str },

    /// Division by a zero decimal.
    #[error("DEX_ERR_102: Division by zero")]
    DivideByZero,

    // =================================================================
    // Tick Grid Errors (2xx)
    // =================================================================
    /// Stepping past the highest or below the lowest representable tick.
    #[error("DEX_ERR_200: Tick out of range: {reason}")]
    TickOutOfRange { reason: String },

    // =================================================================
    // Order Book Errors (3xx)
    // =================================================================
    /// An order with this ID is already in the book.
    #[error("DEX_ERR_300: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The requested order is not in the book.
    #[error("DEX_ERR_301: Order not found: {0}")]
    OrderNotFound(OrderId),

    // =================================================================
    // Pool Errors (4xx)
    // =================================================================
    /// The pool has no liquidity tokens or no reserves.
    #[error("DEX_ERR_400: Pool depleted: {0}")]
    PoolDepleted(PoolId),

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// A structural invariant broke (unsorted ticks, negative volume,
    /// conservation mismatch). Indicates a programmer error upstream.
    #[error("DEX_ERR_500: Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    // =================================================================
    // General (9xx)
    // =================================================================
    /// Invalid configuration value.
    #[error("DEX_ERR_900: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("DEX_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl DexError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DexError>;

impl From<serde_json::Error> for DexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
