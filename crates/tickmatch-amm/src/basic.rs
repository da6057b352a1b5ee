//! Constant-product pool over its real reserves.

use serde::{Deserialize, Serialize};
use tickmatch_types::{Dec, DexError, PoolId, Result};
use tracing::debug;

use crate::math::{
    self, DepositOutcome, WithdrawOutcome, ensure_amount, uniform_buy_amount, uniform_buy_price,
    uniform_sell_amount, uniform_sell_price,
};

/// A basic `x·y = k` pool. `rx` holds the quote asset, `ry` the base
/// asset, so `price = rx / ry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicPool {
    id: PoolId,
    rx: Dec,
    ry: Dec,
    ps: Dec,
}

impl BasicPool {
    /// Load a pool from its reserves and pool coin supply.
    pub fn new(id: PoolId, rx: Dec, ry: Dec, ps: Dec) -> Result<Self> {
        ensure_amount("reserve x", rx)?;
        ensure_amount("reserve y", ry)?;
        ensure_amount("pool coin supply", ps)?;
        Ok(Self { id, rx, ry, ps })
    }

    #[must_use]
    pub fn id(&self) -> PoolId {
        self.id
    }

    #[must_use]
    pub fn reserves(&self) -> (Dec, Dec) {
        (self.rx, self.ry)
    }

    #[must_use]
    pub fn pool_coin_supply(&self) -> Dec {
        self.ps
    }

    /// `ps == 0 || rx == 0 || ry == 0`.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.ps.is_zero() || self.rx.is_zero() || self.ry.is_zero()
    }

    /// `rx / ry`, truncated.
    pub fn price(&self) -> Result<Dec> {
        if self.is_depleted() {
            return Err(DexError::PoolDepleted(self.id));
        }
        self.rx.quo_truncate(self.ry)
    }

    pub fn deposit(&mut self, x: Dec, y: Dec) -> Result<DepositOutcome> {
        if self.is_depleted() {
            return Err(DexError::PoolDepleted(self.id));
        }
        let out = math::proportional_deposit(self.rx, self.ry, self.ps, x, y)?;
        self.rx = self.rx.checked_add(out.accepted_x)?;
        self.ry = self.ry.checked_add(out.accepted_y)?;
        self.ps = self.ps.checked_add(out.minted)?;
        debug!(pool = %self.id, minted = %out.minted, "deposit");
        Ok(out)
    }

    pub fn withdraw(&mut self, pc: Dec, fee_rate: Dec) -> Result<WithdrawOutcome> {
        let out = math::proportional_withdraw(self.rx, self.ry, self.ps, pc, fee_rate)?;
        self.rx = self.rx.checked_sub(out.x)?;
        self.ry = self.ry.checked_sub(out.y)?;
        self.ps = self.ps.checked_sub(pc)?;
        debug!(pool = %self.id, burned = %pc, x = %out.x, y = %out.y, "withdraw");
        Ok(out)
    }

    /// Base units the pool buys at prices `>= price`. Zero at or above the
    /// pool price.
    pub fn buy_amount_over(&self, price: Dec) -> Result<Dec> {
        if self.is_depleted() {
            return Ok(Dec::ZERO);
        }
        uniform_buy_amount(self.rx, self.ry, price)
    }

    /// Base units the pool sells at prices `<= price`. Zero at or below the
    /// pool price.
    pub fn sell_amount_under(&self, price: Dec) -> Result<Dec> {
        if self.is_depleted() {
            return Ok(Dec::ZERO);
        }
        uniform_sell_amount(self.rx, self.ry, price)
    }

    /// Highest price at which the pool buys at least `amount`.
    pub fn buy_price_for(&self, amount: Dec) -> Result<Option<Dec>> {
        if self.is_depleted() || !amount.is_positive() {
            return Ok(None);
        }
        uniform_buy_price(self.rx, self.ry, amount).map(Some)
    }

    /// Lowest price at which the pool sells at least `amount`.
    pub fn sell_price_for(&self, amount: Dec) -> Result<Option<Dec>> {
        if self.is_depleted() || !amount.is_positive() {
            return Ok(None);
        }
        uniform_sell_price(self.rx, self.ry, amount)
    }

    pub(crate) fn set_reserves(&mut self, rx: Dec, ry: Dec) {
        self.rx = rx;
        self.ry = ry;
    }
}
