//! Reserve math shared by every pool kind.
//!
//! Amounts are integral base or quote units held in a [`Dec`]. Prices are
//! quote per base. Every rounding step favours the pool.

use serde::{Deserialize, Serialize};
use tickmatch_types::{Dec, DexError, Result};

/// Liquidity accepted by a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositOutcome {
    /// Pool coins minted to the depositor.
    pub minted: Dec,
    /// Quote units taken into the pool (`<=` offered).
    pub accepted_x: Dec,
    /// Base units taken into the pool (`<=` offered).
    pub accepted_y: Dec,
}

impl DepositOutcome {
    pub(crate) fn nothing() -> Self {
        Self {
            minted: Dec::ZERO,
            accepted_x: Dec::ZERO,
            accepted_y: Dec::ZERO,
        }
    }
}

/// Reserves paid out by a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawOutcome {
    pub x: Dec,
    pub y: Dec,
}

/// Reject negative or fractional amounts.
pub(crate) fn ensure_amount(name: &str, value: Dec) -> Result<()> {
    if value.is_negative() || !value.is_integer() {
        return Err(DexError::invalid(format!(
            "{name} {value} must be a non-negative integer"
        )));
    }
    Ok(())
}

/// Proportional deposit against `(rx, ry, ps)`.
///
/// `pc = min(trunc(ps·x/rx), trunc(ps·y/ry))` over the legs with a nonzero
/// reserve, then each leg takes `ceil(reserve·pc/ps)`.
pub(crate) fn proportional_deposit(
    rx: Dec,
    ry: Dec,
    ps: Dec,
    x: Dec,
    y: Dec,
) -> Result<DepositOutcome> {
    ensure_amount("deposit x", x)?;
    ensure_amount("deposit y", y)?;
    let mut minted: Option<Dec> = None;
    for (reserve, offered) in [(rx, x), (ry, y)] {
        if reserve.is_zero() {
            continue;
        }
        let leg = ps.mul_truncate(offered)?.quo_truncate(reserve)?.truncate();
        minted = Some(minted.map_or(leg, |m| m.min(leg)));
    }
    let Some(minted) = minted else {
        return Err(DexError::invalid("deposit into a pool with no reserves"));
    };
    if minted.is_zero() {
        return Ok(DepositOutcome::nothing());
    }
    let take = |reserve: Dec| -> Result<Dec> {
        reserve.mul_truncate(minted)?.quo_round_up(ps)?.ceil()
    };
    Ok(DepositOutcome {
        minted,
        accepted_x: take(rx)?,
        accepted_y: take(ry)?,
    })
}

/// Proportional withdrawal of `pc` pool coins out of `ps`, keeping
/// `fee_rate` of the payout in the pool. Redeeming the whole supply returns
/// the exact reserves.
pub(crate) fn proportional_withdraw(
    rx: Dec,
    ry: Dec,
    ps: Dec,
    pc: Dec,
    fee_rate: Dec,
) -> Result<WithdrawOutcome> {
    ensure_amount("withdrawn pool coin", pc)?;
    if pc.is_zero() || pc > ps {
        return Err(DexError::invalid(format!(
            "withdrawn pool coin {pc} must be in (0, {ps}]"
        )));
    }
    if fee_rate.is_negative() || fee_rate >= Dec::ONE {
        return Err(DexError::invalid(format!(
            "withdraw fee rate {fee_rate} must be in [0, 1)"
        )));
    }
    if pc == ps {
        return Ok(WithdrawOutcome { x: rx, y: ry });
    }
    let proportion = pc.quo_truncate(ps)?;
    let multiplier = Dec::ONE.checked_sub(fee_rate)?;
    let payout = |reserve: Dec| -> Result<Dec> {
        Ok(reserve
            .mul_truncate(proportion)?
            .mul_truncate(multiplier)?
            .truncate())
    };
    Ok(WithdrawOutcome {
        x: payout(rx)?,
        y: payout(ry)?,
    })
}

/// Base units a constant-product curve over `(x, y)` buys to move its price
/// down to `price`, all at `price`: `trunc((x − price·y) / 2·price)`.
/// Zero at or above the curve's price.
pub(crate) fn uniform_buy_amount(x: Dec, y: Dec, price: Dec) -> Result<Dec> {
    let numerator = x.checked_sub(price.mul_truncate(y)?)?;
    if !numerator.is_positive() {
        return Ok(Dec::ZERO);
    }
    Ok(numerator
        .quo_truncate(price.checked_add(price)?)?
        .truncate())
}

/// Base units a constant-product curve over `(x, y)` sells to move its
/// price up to `price`, all at `price`: `trunc((price·y − x) / 2·price)`.
/// Zero at or below the curve's price.
pub(crate) fn uniform_sell_amount(x: Dec, y: Dec, price: Dec) -> Result<Dec> {
    let numerator = price.mul_truncate(y)?.checked_sub(x)?;
    if !numerator.is_positive() {
        return Ok(Dec::ZERO);
    }
    Ok(numerator
        .quo_truncate(price.checked_add(price)?)?
        .truncate())
}

/// Inverse of [`uniform_buy_amount`]: the highest price at which the curve
/// buys at least `amount`, `x / (y + 2·amount)` truncated.
pub(crate) fn uniform_buy_price(x: Dec, y: Dec, amount: Dec) -> Result<Dec> {
    let denominator = y.checked_add(amount)?.checked_add(amount)?;
    if !denominator.is_positive() {
        return Err(DexError::invalid(format!(
            "no buy price for {amount} against reserves ({x}, {y})"
        )));
    }
    x.quo_truncate(denominator)
}

/// Inverse of [`uniform_sell_amount`]: the lowest price at which the curve
/// sells at least `amount`, `x / (y − 2·amount)` rounded up. `None` once
/// `amount` reaches half of `y`, which no price can pull out of the curve.
pub(crate) fn uniform_sell_price(x: Dec, y: Dec, amount: Dec) -> Result<Option<Dec>> {
    let rest = y.checked_sub(amount)?.checked_sub(amount)?;
    if !rest.is_positive() {
        return Ok(None);
    }
    Ok(Some(x.quo_round_up(rest)?))
}
