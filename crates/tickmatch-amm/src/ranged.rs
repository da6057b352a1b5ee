//! Constant-product pool confined to a price band.
//!
//! The curve runs over virtual reserves `(rx + tx, ry + ty)`. With liquidity
//! `L` the offsets are `tx = L·√min` and `ty = L/√max`, where `L` is the
//! positive root of
//!
//! ```text
//! (1 − √(min/max))·L² − (rx/√max + ry·√min)·L − rx·ry = 0
//! ```
//!
//! At `min` the pool holds only the base asset, at `max` only the quote
//! asset, so a one-sided pool is valid.

use serde::{Deserialize, Serialize};
use tickmatch_types::{Dec, DexError, PoolId, Result};
use tracing::debug;

use crate::math::{
    self, DepositOutcome, WithdrawOutcome, ensure_amount, uniform_buy_amount, uniform_buy_price,
    uniform_sell_amount, uniform_sell_price,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangedPool {
    id: PoolId,
    rx: Dec,
    ry: Dec,
    ps: Dec,
    min_price: Dec,
    max_price: Dec,
    trans_x: Dec,
    trans_y: Dec,
}

impl RangedPool {
    /// Load a ranged pool and derive its virtual reserve offsets.
    pub fn new(
        id: PoolId,
        rx: Dec,
        ry: Dec,
        ps: Dec,
        min_price: Dec,
        max_price: Dec,
    ) -> Result<Self> {
        ensure_amount("reserve x", rx)?;
        ensure_amount("reserve y", ry)?;
        ensure_amount("pool coin supply", ps)?;
        if !min_price.is_positive() || min_price >= max_price {
            return Err(DexError::invalid(format!(
                "price band [{min_price}, {max_price}] must satisfy 0 < min < max"
            )));
        }
        let mut pool = Self {
            id,
            rx,
            ry,
            ps,
            min_price,
            max_price,
            trans_x: Dec::ZERO,
            trans_y: Dec::ZERO,
        };
        pool.derive_translation()?;
        Ok(pool)
    }

    fn derive_translation(&mut self) -> Result<()> {
        if self.rx.is_zero() && self.ry.is_zero() {
            self.trans_x = Dec::ZERO;
            self.trans_y = Dec::ZERO;
            return Ok(());
        }
        let sqrt_min = self.min_price.sqrt()?;
        let sqrt_max = self.max_price.sqrt()?;
        let band = Dec::ONE.checked_sub(self.min_price.quo_truncate(self.max_price)?.sqrt()?)?;
        if !band.is_positive() {
            return Err(DexError::invalid(format!(
                "price band [{}, {}] is too narrow",
                self.min_price, self.max_price
            )));
        }
        let b = self
            .rx
            .quo_truncate(sqrt_max)?
            .checked_add(self.ry.mul_truncate(sqrt_min)?)?;
        let four_acx = band
            .mul_truncate(self.rx.mul_truncate(self.ry)?)?
            .mul_truncate(Dec::from_int(4))?;
        let discriminant = b.mul_truncate(b)?.checked_add(four_acx)?;
        let liquidity = b
            .checked_add(discriminant.sqrt()?)?
            .quo_truncate(band.checked_add(band)?)?;
        self.trans_x = liquidity.mul_truncate(sqrt_min)?;
        self.trans_y = liquidity.quo_truncate(sqrt_max)?;
        Ok(())
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

    /// `(min_price, max_price)`.
    #[must_use]
    pub fn price_band(&self) -> (Dec, Dec) {
        (self.min_price, self.max_price)
    }

    /// `(tx, ty)` added to the real reserves.
    #[must_use]
    pub fn translation(&self) -> (Dec, Dec) {
        (self.trans_x, self.trans_y)
    }

    /// `ps == 0`, or both reserves empty.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.ps.is_zero() || (self.rx.is_zero() && self.ry.is_zero())
    }

    /// `(rx + tx) / (ry + ty)`, truncated.
    pub fn price(&self) -> Result<Dec> {
        if self.is_depleted() {
            return Err(DexError::PoolDepleted(self.id));
        }
        let (x, y) = self.virtual_reserves()?;
        x.quo_truncate(y)
    }

    fn virtual_reserves(&self) -> Result<(Dec, Dec)> {
        Ok((
            self.rx.checked_add(self.trans_x)?,
            self.ry.checked_add(self.trans_y)?,
        ))
    }

    pub fn deposit(&mut self, x: Dec, y: Dec) -> Result<DepositOutcome> {
        if self.is_depleted() {
            return Err(DexError::PoolDepleted(self.id));
        }
        let out = math::proportional_deposit(self.rx, self.ry, self.ps, x, y)?;
        self.rx = self.rx.checked_add(out.accepted_x)?;
        self.ry = self.ry.checked_add(out.accepted_y)?;
        self.ps = self.ps.checked_add(out.minted)?;
        self.derive_translation()?;
        debug!(pool = %self.id, minted = %out.minted, "ranged deposit");
        Ok(out)
    }

    pub fn withdraw(&mut self, pc: Dec, fee_rate: Dec) -> Result<WithdrawOutcome> {
        let out = math::proportional_withdraw(self.rx, self.ry, self.ps, pc, fee_rate)?;
        self.rx = self.rx.checked_sub(out.x)?;
        self.ry = self.ry.checked_sub(out.y)?;
        self.ps = self.ps.checked_sub(pc)?;
        self.derive_translation()?;
        debug!(pool = %self.id, burned = %pc, x = %out.x, y = %out.y, "ranged withdraw");
        Ok(out)
    }

    /// Base units bought at prices `>= price`. Prices below the band count
    /// as `min_price`, and the pool never spends more quote than it holds.
    pub fn buy_amount_over(&self, price: Dec) -> Result<Dec> {
        if self.is_depleted() || self.rx.is_zero() {
            return Ok(Dec::ZERO);
        }
        let (x, y) = self.virtual_reserves()?;
        let amount = uniform_buy_amount(x, y, price.max(self.min_price))?;
        let affordable = self.rx.quo_truncate(price)?.truncate();
        Ok(amount.min(affordable))
    }

    /// Base units sold at prices `<= price`. Prices above the band count as
    /// `max_price`, capped by the real base reserve.
    pub fn sell_amount_under(&self, price: Dec) -> Result<Dec> {
        if self.is_depleted() || self.ry.is_zero() {
            return Ok(Dec::ZERO);
        }
        let (x, y) = self.virtual_reserves()?;
        let amount = uniform_sell_amount(x, y, price.min(self.max_price))?;
        Ok(amount.min(self.ry))
    }

    /// Highest price at which the pool buys at least `amount`. `None` when
    /// even `min_price` does not draw that much out of the curve.
    pub fn buy_price_for(&self, amount: Dec) -> Result<Option<Dec>> {
        if self.is_depleted() || self.rx.is_zero() || !amount.is_positive() {
            return Ok(None);
        }
        let (x, y) = self.virtual_reserves()?;
        let curve = uniform_buy_price(x, y, amount)?;
        if curve < self.min_price {
            return Ok(None);
        }
        let affordable = self.rx.quo_truncate(amount)?;
        Ok(Some(curve.min(affordable)))
    }

    /// Lowest price at which the pool sells at least `amount`. `None` past
    /// the real base reserve or beyond `max_price`.
    pub fn sell_price_for(&self, amount: Dec) -> Result<Option<Dec>> {
        if self.is_depleted() || !amount.is_positive() || amount > self.ry {
            return Ok(None);
        }
        let (x, y) = self.virtual_reserves()?;
        Ok(uniform_sell_price(x, y, amount)?.filter(|price| *price <= self.max_price))
    }

    pub(crate) fn set_reserves(&mut self, rx: Dec, ry: Dec) -> Result<()> {
        self.rx = rx;
        self.ry = ry;
        self.derive_translation()
    }
}
