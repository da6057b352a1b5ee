//! Conservation invariant checker.
//!
//! Enforced on every matched batch before it is returned:
//! ```text
//! Σ buy filled == Σ sell filled == matched_amount
//! Σ buy quote − Σ sell quote == dust >= 0
//! ∀ fill: dust == |quote − price × filled|, signed against the trader
//! ∀ pool: delta == Σ of its fills
//! ```
//!
//! A violation means settlement is broken; the batch is rejected with
//! [`DexError::InvariantViolation`] rather than committed.

use std::collections::BTreeMap;

use tickmatch_types::{Dec, DexError, Direction, MatchResult, OrderRef, PoolDelta, PoolId, Result};

/// Check every conservation rule on a settled batch.
pub fn verify_conservation(result: &MatchResult) -> Result<()> {
    let bought = result.total_filled(Direction::Buy)?;
    let sold = result.total_filled(Direction::Sell)?;
    if bought != result.matched_amount || sold != result.matched_amount {
        return Err(DexError::invariant(format!(
            "base not conserved: bought {bought}, sold {sold}, matched {}",
            result.matched_amount
        )));
    }

    let paid = result.total_quote(Direction::Buy)?;
    let received = result.total_quote(Direction::Sell)?;
    let dust = paid.checked_sub(received)?;
    if dust != result.dust || dust.is_negative() {
        return Err(DexError::invariant(format!(
            "quote not conserved: paid {paid}, received {received}, dust {}",
            result.dust
        )));
    }

    let mut fill_dust = Dec::ZERO;
    let mut expected: BTreeMap<PoolId, PoolDelta> = BTreeMap::new();
    for fill in &result.fills {
        let exact = result.price.mul_truncate(fill.filled_amount)?;
        let leftover = match fill.direction {
            Direction::Buy => fill.quote_amount.checked_sub(exact)?,
            Direction::Sell => exact.checked_sub(fill.quote_amount)?,
        };
        if leftover != fill.dust || leftover.is_negative() || !fill.quote_amount.is_integer() {
            return Err(DexError::invariant(format!(
                "{} {}: quote {} for {} at {} leaves dust {leftover}, recorded {}",
                fill.direction,
                fill.order,
                fill.quote_amount,
                fill.filled_amount,
                result.price,
                fill.dust
            )));
        }
        fill_dust = fill_dust.checked_add(fill.dust)?;
        if let OrderRef::Pool(pool) = fill.order {
            expected
                .entry(pool)
                .or_insert_with(|| PoolDelta::new(pool))
                .absorb(fill)?;
        }
    }
    if fill_dust != result.dust {
        return Err(DexError::invariant(format!(
            "per-fill dust {fill_dust} does not sum to batch dust {}",
            result.dust
        )));
    }

    let expected: Vec<PoolDelta> = expected.into_values().collect();
    if expected != result.pool_deltas {
        return Err(DexError::invariant(format!(
            "pool deltas {:?} do not match pool fills {expected:?}",
            result.pool_deltas
        )));
    }
    Ok(())
}
