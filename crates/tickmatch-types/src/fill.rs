//! Fill records produced by batch settlement.
//!
//! Every fill executes at the batch's single clearing price. Quote amounts
//! are rounded against the trader: a buyer pays `ceil(price × filled)`, a
//! seller receives `trunc(price × filled)`. The rounding leftover of each
//! fill is recorded as its `dust`; the batch's dust is their sum.

use serde::{Deserialize, Serialize};

use crate::{Dec, Direction, OrderRef, PoolId, Result};

/// One order's (or one pool tick's) share of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Book order or pool that was filled.
    pub order: OrderRef,
    pub direction: Direction,
    /// The order's own limit price (the pool tick for synthetic orders).
    pub order_price: Dec,
    /// Base units bought or sold.
    pub filled_amount: Dec,
    /// Quote units paid (buy) or received (sell), already rounded.
    pub quote_amount: Dec,
    /// Rounding leftover: `quote − price×filled` for a buy,
    /// `price×filled − quote` for a sell. Never negative.
    pub dust: Dec,
    /// `true` if the order keeps a nonzero open amount after this fill.
    pub partial: bool,
}

impl Fill {
    /// Quote paid into the batch (buy) or taken out (sell), signed from the
    /// batch's point of view.
    pub fn quote_flow(&self) -> Dec {
        match self.direction {
            Direction::Buy => self.quote_amount,
            Direction::Sell => -self.quote_amount,
        }
    }
}

/// Why an order sat out of this batch's settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExclusionReason {
    /// A sell fill would have paid the seller zero quote units.
    ZeroReceipt,
    /// A buy fill's rounded-up payment exceeds the remaining escrow.
    InsufficientOffer,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroReceipt => write!(f, "ZERO_RECEIPT"),
            Self::InsufficientOffer => write!(f, "INSUFFICIENT_OFFER"),
        }
    }
}

/// An order removed from settlement by rounding. Its open amount is left
/// untouched for a future batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedOrder {
    pub order: OrderRef,
    pub direction: Direction,
    pub reason: ExclusionReason,
    /// The fill it would have received.
    pub prospective_amount: Dec,
}

/// Net reserve change of a pool over one batch. Positive values flow into
/// the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDelta {
    pub pool: PoolId,
    pub base_delta: Dec,
    pub quote_delta: Dec,
}

impl PoolDelta {
    #[must_use]
    pub fn new(pool: PoolId) -> Self {
        Self {
            pool,
            base_delta: Dec::ZERO,
            quote_delta: Dec::ZERO,
        }
    }

    /// Fold one of the pool's fills into the delta.
    pub fn absorb(&mut self, fill: &Fill) -> Result<()> {
        match fill.direction {
            Direction::Buy => {
                self.base_delta = self.base_delta.checked_add(fill.filled_amount)?;
                self.quote_delta = self.quote_delta.checked_sub(fill.quote_amount)?;
            }
            Direction::Sell => {
                self.base_delta = self.base_delta.checked_sub(fill.filled_amount)?;
                self.quote_delta = self.quote_delta.checked_add(fill.quote_amount)?;
            }
        }
        Ok(())
    }
}
