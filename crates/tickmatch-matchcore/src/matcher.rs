//! Pure deterministic batch matcher.
//!
//! ```text
//! MatchEngine::run_batch(BatchContext, &OrderBook, &[Pool]) -> MatchOutcome
//! ```
//!
//! ## Algorithm
//!
//! 1. Merge the book with a synthetic order source per non-depleted pool
//! 2. Build the order view; no crossing interest means `Unmatchable`
//! 3. Find the clearing price from the midpoint of the best prices
//! 4. Settle crossing orders at that price, rounding against the trader
//! 5. Check conservation and compute the match root
//!
//! The engine reads nothing but its arguments. Pool memo caches live in the
//! merged source, which is rebuilt for every call and dropped at its end.

use std::collections::BTreeSet;

use tickmatch_amm::{Pool, WithdrawOutcome};
use tickmatch_types::{
    BatchContext, Dec, DexError, MatchConfig, MatchOutcome, MatchResult, OrderRef, Result,
    TickGrid,
};
use tracing::{debug, info};

use crate::clearing::find_clearing_price;
use crate::conservation::verify_conservation;
use crate::determinism::compute_match_root;
use crate::settlement::settle;
use crate::source::{OrderSource, PoolOrderSource};
use crate::{OrderBook, OrderView};

/// Batch matcher for one trading pair.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    config: MatchConfig,
    grid: TickGrid,
}

impl MatchEngine {
    /// Validate `config` and build its tick grid.
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        let grid = config.tick_grid()?;
        Ok(Self { config, grid })
    }

    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> &TickGrid {
        &self.grid
    }

    /// The book plus every pool that can still trade, as one source.
    fn merged_source<'a>(
        &'a self,
        ctx: &BatchContext,
        book: &'a OrderBook,
        pools: &'a [Pool],
    ) -> Result<OrderSource<'a>> {
        if book.grid() != &self.grid {
            return Err(DexError::Configuration(format!(
                "book tick precision {} differs from engine precision {}",
                book.grid().precision(),
                self.grid.precision()
            )));
        }
        let mut seen = BTreeSet::new();
        let mut sources = vec![OrderSource::Book(book)];
        for pool in pools {
            if !seen.insert(pool.id()) {
                return Err(DexError::invalid(format!("{} supplied twice", pool.id())));
            }
            match PoolOrderSource::new(
                pool,
                &self.grid,
                ctx.last_price,
                self.config.max_price_limit_ratio,
            )? {
                Some(source) => sources.push(OrderSource::Pool(source)),
                None => debug!(pool = %pool.id(), "skipping pool without quotes"),
            }
        }
        Ok(OrderSource::Merged(sources))
    }

    /// Cheap pre-check: does any buy cross any sell?
    pub fn is_matchable(
        &self,
        ctx: &BatchContext,
        book: &OrderBook,
        pools: &[Pool],
    ) -> Result<bool> {
        let mut source = self.merged_source(ctx, book, pools)?;
        let highest_buy = source.highest_buy_price()?;
        let lowest_sell = source.lowest_sell_price()?;
        Ok(matches!((highest_buy, lowest_sell), (Some(hb), Some(ls)) if hb >= ls))
    }

    /// Match one batch. Book and pools are only read; apply the result
    /// with [`MatchEngine::apply_outcome`].
    pub fn run_batch(
        &self,
        ctx: &BatchContext,
        book: &OrderBook,
        pools: &[Pool],
    ) -> Result<MatchOutcome> {
        let mut source = self.merged_source(ctx, book, pools)?;
        let view = OrderView::build(&mut source)?;

        let (Some(highest_buy), Some(lowest_sell)) =
            (view.highest_buy_price(), view.lowest_sell_price())
        else {
            debug!(batch = %ctx.batch_id, "one side is empty");
            return Ok(MatchOutcome::Unmatchable);
        };
        if highest_buy < lowest_sell {
            debug!(batch = %ctx.batch_id, %highest_buy, %lowest_sell, "no crossing interest");
            return Ok(MatchOutcome::Unmatchable);
        }

        let clearing = find_clearing_price(&view, &self.grid, highest_buy, lowest_sell)?;
        let settlement = settle(&mut source, &view, clearing.price)?;

        let mut result = MatchResult {
            batch_id: ctx.batch_id,
            matched_at: ctx.block_time,
            price: clearing.price,
            matched_amount: settlement.matched_amount,
            fills: settlement.fills,
            excluded: settlement.excluded,
            pool_deltas: settlement.pool_deltas,
            dust: settlement.dust,
            dust_collector: self.config.dust_collector.clone(),
            match_root: [0u8; 32],
        };
        verify_conservation(&result)?;
        result.match_root = compute_match_root(&result);

        info!(
            batch = %ctx.batch_id,
            price = %result.price,
            direction = %clearing.direction,
            steps = clearing.steps,
            matched = %result.matched_amount,
            fills = result.fills.len(),
            excluded = result.excluded.len(),
            dust = %result.dust,
            match_root = hex::encode(result.match_root),
            "Batch matching complete"
        );
        Ok(MatchOutcome::Matched(result))
    }

    /// Apply a matched batch: fills to the book's orders, net deltas to the
    /// pools' reserves.
    pub fn apply_outcome(
        result: &MatchResult,
        book: &mut OrderBook,
        pools: &mut [Pool],
    ) -> Result<()> {
        for fill in &result.fills {
            if let OrderRef::Order(_) = fill.order {
                book.apply_fill(fill)?;
            }
        }
        for delta in &result.pool_deltas {
            let pool = pools
                .iter_mut()
                .find(|p| p.id() == delta.pool)
                .ok_or_else(|| DexError::invalid(format!("{} not supplied", delta.pool)))?;
            pool.apply_fill(delta)?;
        }
        Ok(())
    }

    /// Redeem `pool_coin` from `pool`, leaving the configured withdraw fee
    /// in its reserves.
    pub fn withdraw(&self, pool: &mut Pool, pool_coin: Dec) -> Result<WithdrawOutcome> {
        let out = pool.withdraw(pool_coin, self.config.withdraw_fee_rate)?;
        debug!(pool = %pool.id(), fee_rate = %self.config.withdraw_fee_rate, "pool coin redeemed");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tickmatch_amm::BasicPool;
    use tickmatch_types::{BatchId, Order, PoolId};

    use super::*;

    fn ctx() -> BatchContext {
        BatchContext {
            batch_id: BatchId(1),
            block_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_price: None,
        }
    }

    fn engine() -> MatchEngine {
        MatchEngine::new(MatchConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MatchConfig {
            max_price_limit_ratio: Dec::ONE,
            ..MatchConfig::default()
        };
        assert!(matches!(MatchEngine::new(config), Err(DexError::Configuration(_))));
    }

    #[test]
    fn empty_book_is_unmatchable() {
        let engine = engine();
        let book = OrderBook::new(engine.grid().clone());
        assert!(!engine.is_matchable(&ctx(), &book, &[]).unwrap());
        assert_eq!(engine.run_batch(&ctx(), &book, &[]).unwrap(), MatchOutcome::Unmatchable);
    }

    #[test]
    fn grid_mismatch_is_rejected() {
        let engine = engine();
        let book = OrderBook::new(TickGrid::new(2).unwrap());
        assert!(matches!(
            engine.run_batch(&ctx(), &book, &[]),
            Err(DexError::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_pool_is_rejected() {
        let engine = engine();
        let book = OrderBook::new(engine.grid().clone());
        let pools = [Pool::dummy_basic(1, 1000, 1000), Pool::dummy_basic(1, 1000, 1000)];
        assert!(engine.run_batch(&ctx(), &book, &pools).is_err());
    }

    #[test]
    fn result_is_stamped_and_rooted() {
        let engine = engine();
        let mut book = OrderBook::new(engine.grid().clone());
        book.add_orders([Order::dummy_buy(1, "1", 10), Order::dummy_sell(2, "1", 10)])
            .unwrap();
        let outcome = engine.run_batch(&ctx(), &book, &[]).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.batch_id, BatchId(1));
        assert_eq!(result.matched_at, ctx().block_time);
        assert_eq!(result.dust_collector, engine.config().dust_collector);
        assert!(crate::verify_match_root(result));
    }

    #[test]
    fn apply_outcome_updates_book() {
        let engine = engine();
        let mut book = OrderBook::new(engine.grid().clone());
        book.add_orders([Order::dummy_buy(1, "1", 10), Order::dummy_sell(2, "1", 4)])
            .unwrap();
        let outcome = engine.run_batch(&ctx(), &book, &[]).unwrap();
        MatchEngine::apply_outcome(outcome.result().unwrap(), &mut book, &mut []).unwrap();
        let buy = book.order(tickmatch_types::OrderId(1)).unwrap();
        assert_eq!(buy.open_amount, Dec::from_int(6));
        assert_eq!(buy.received, Dec::from_int(4));
        assert!(book.order(tickmatch_types::OrderId(2)).unwrap().is_filled());
    }

    #[test]
    fn withdraw_keeps_the_configured_fee_in_the_pool() {
        let pool = || -> Pool {
            BasicPool::new(PoolId(3), Dec::from_int(1000), Dec::from_int(2000), Dec::from_int(300))
                .unwrap()
                .into()
        };
        let taxed = MatchEngine::new(MatchConfig {
            withdraw_fee_rate: Dec::new(3, 3),
            ..MatchConfig::default()
        })
        .unwrap();

        let mut charged = pool();
        let out = taxed.withdraw(&mut charged, Dec::from_int(100)).unwrap();
        // 1000 · 1/3 · 0.997 = 332.33
        assert_eq!((out.x, out.y), (Dec::from_int(332), Dec::from_int(664)));
        assert_eq!(charged.reserves(), (Dec::from_int(668), Dec::from_int(1336)));
        assert_eq!(charged.pool_coin_supply(), Dec::from_int(200));

        let mut free = pool();
        let out = engine().withdraw(&mut free, Dec::from_int(100)).unwrap();
        assert_eq!((out.x, out.y), (Dec::from_int(333), Dec::from_int(666)));
    }
}
