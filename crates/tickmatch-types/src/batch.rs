//! Batch-level inputs and outcomes.
//!
//! A batch either has no crossing interest ([`MatchOutcome::Unmatchable`])
//! or settles at exactly one clearing price ([`MatchOutcome::Matched`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BatchId, Dec, Direction, ExcludedOrder, Fill, OrderRef, PoolDelta, Result};

/// Caller-supplied context of one batch. `block_time` comes from the
/// ledger, never from a local clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    pub batch_id: BatchId,
    pub block_time: DateTime<Utc>,
    /// Clearing price of the pair's previous matched batch, if any.
    pub last_price: Option<Dec>,
}

/// Everything a matched batch settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub batch_id: BatchId,
    pub matched_at: DateTime<Utc>,
    /// The single clearing price.
    pub price: Dec,
    /// Base units exchanged (identical on both sides).
    pub matched_amount: Dec,
    /// Buys first (best price, then sequence), then sells.
    pub fills: Vec<Fill>,
    pub excluded: Vec<ExcludedOrder>,
    /// One entry per pool that traded, ordered by pool id.
    pub pool_deltas: Vec<PoolDelta>,
    /// Σ buy payments − Σ sell receipts, in quote units.
    pub dust: Dec,
    /// Account that receives `dust`.
    pub dust_collector: String,
    /// SHA-256 commitment over the result, for cross-node comparison.
    pub match_root: [u8; 32],
}

impl MatchResult {
    pub fn fills_for(&self, direction: Direction) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(move |f| f.direction == direction)
    }

    #[must_use]
    pub fn fill_of(&self, order: OrderRef) -> Option<&Fill> {
        self.fills.iter().find(|f| f.order == order)
    }

    /// Base units filled on one side.
    pub fn total_filled(&self, direction: Direction) -> Result<Dec> {
        self.fills_for(direction)
            .try_fold(Dec::ZERO, |acc, f| acc.checked_add(f.filled_amount))
    }

    /// Quote units paid by buyers or received by sellers.
    pub fn total_quote(&self, direction: Direction) -> Result<Dec> {
        self.fills_for(direction)
            .try_fold(Dec::ZERO, |acc, f| acc.checked_add(f.quote_amount))
    }
}

/// Terminal state of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// No crossing interest this batch. Not an error.
    Unmatchable,
    Matched(MatchResult),
}

impl MatchOutcome {
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    #[must_use]
    pub fn price(&self) -> Option<Dec> {
        match self {
            Self::Unmatchable => None,
            Self::Matched(result) => Some(result.price),
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&MatchResult> {
        match self {
            Self::Unmatchable => None,
            Self::Matched(result) => Some(result),
        }
    }
}
