//! The closed set of pool kinds.
//!
//! Pools are dispatched through an enum rather than trait objects: the set
//! of kinds is fixed and every caller needs the same handful of queries.

use serde::{Deserialize, Serialize};
use tickmatch_types::{Dec, DexError, PoolDelta, PoolId, Result};
use tracing::debug;

use crate::math::{DepositOutcome, WithdrawOutcome};
use crate::{BasicPool, RangedPool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pool {
    Basic(BasicPool),
    Ranged(RangedPool),
}

impl Pool {
    #[must_use]
    pub fn id(&self) -> PoolId {
        match self {
            Self::Basic(p) => p.id(),
            Self::Ranged(p) => p.id(),
        }
    }

    /// `(rx, ry)`: quote reserve, base reserve.
    #[must_use]
    pub fn reserves(&self) -> (Dec, Dec) {
        match self {
            Self::Basic(p) => p.reserves(),
            Self::Ranged(p) => p.reserves(),
        }
    }

    #[must_use]
    pub fn pool_coin_supply(&self) -> Dec {
        match self {
            Self::Basic(p) => p.pool_coin_supply(),
            Self::Ranged(p) => p.pool_coin_supply(),
        }
    }

    /// A depleted pool must not act as an order source.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        match self {
            Self::Basic(p) => p.is_depleted(),
            Self::Ranged(p) => p.is_depleted(),
        }
    }

    pub fn price(&self) -> Result<Dec> {
        match self {
            Self::Basic(p) => p.price(),
            Self::Ranged(p) => p.price(),
        }
    }

    pub fn deposit(&mut self, x: Dec, y: Dec) -> Result<DepositOutcome> {
        match self {
            Self::Basic(p) => p.deposit(x, y),
            Self::Ranged(p) => p.deposit(x, y),
        }
    }

    pub fn withdraw(&mut self, pc: Dec, fee_rate: Dec) -> Result<WithdrawOutcome> {
        match self {
            Self::Basic(p) => p.withdraw(pc, fee_rate),
            Self::Ranged(p) => p.withdraw(pc, fee_rate),
        }
    }

    /// Cumulative base units the pool buys at prices `>= price`.
    pub fn buy_amount_over(&self, price: Dec) -> Result<Dec> {
        match self {
            Self::Basic(p) => p.buy_amount_over(price),
            Self::Ranged(p) => p.buy_amount_over(price),
        }
    }

    /// Cumulative base units the pool sells at prices `<= price`.
    pub fn sell_amount_under(&self, price: Dec) -> Result<Dec> {
        match self {
            Self::Basic(p) => p.sell_amount_under(price),
            Self::Ranged(p) => p.sell_amount_under(price),
        }
    }

    /// Highest price at which the pool buys at least `amount`: the inverse
    /// of [`buy_amount_over`](Self::buy_amount_over), up to the curve's own
    /// truncation.
    pub fn buy_price_for(&self, amount: Dec) -> Result<Option<Dec>> {
        match self {
            Self::Basic(p) => p.buy_price_for(amount),
            Self::Ranged(p) => p.buy_price_for(amount),
        }
    }

    /// Lowest price at which the pool sells at least `amount`.
    pub fn sell_price_for(&self, amount: Dec) -> Result<Option<Dec>> {
        match self {
            Self::Basic(p) => p.sell_price_for(amount),
            Self::Ranged(p) => p.sell_price_for(amount),
        }
    }

    /// Apply a batch's net reserve change.
    pub fn apply_fill(&mut self, delta: &PoolDelta) -> Result<()> {
        if delta.pool != self.id() {
            return Err(DexError::invalid(format!(
                "delta for {} applied to {}",
                delta.pool,
                self.id()
            )));
        }
        let (rx, ry) = self.reserves();
        let rx = rx.checked_add(delta.quote_delta)?;
        let ry = ry.checked_add(delta.base_delta)?;
        if rx.is_negative() || ry.is_negative() {
            return Err(DexError::invariant(format!(
                "{} reserves would go negative ({rx}, {ry})",
                self.id()
            )));
        }
        match self {
            Self::Basic(p) => p.set_reserves(rx, ry),
            Self::Ranged(p) => p.set_reserves(rx, ry)?,
        }
        debug!(pool = %delta.pool, base = %delta.base_delta, quote = %delta.quote_delta, "pool fill applied");
        Ok(())
    }
}

impl From<BasicPool> for Pool {
    fn from(pool: BasicPool) -> Self {
        Self::Basic(pool)
    }
}

impl From<RangedPool> for Pool {
    fn from(pool: RangedPool) -> Self {
        Self::Ranged(pool)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Pool {
    /// A basic pool with `ps = 1`; panics on malformed input.
    pub fn dummy_basic(id: u64, rx: u64, ry: u64) -> Self {
        let pool = BasicPool::new(
            PoolId(id),
            Dec::from_u128(u128::from(rx)),
            Dec::from_u128(u128::from(ry)),
            Dec::ONE,
        )
        .expect("valid pool");
        Self::Basic(pool)
    }
}
