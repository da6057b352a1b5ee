//! Clearing price search for batch auctions.
//!
//! Starting from the midpoint of the best buy and best sell, compare the
//! volumes that would trade there. If they balance, the midpoint (rounded
//! to a tick) clears the batch. Otherwise walk toward the heavier side,
//! one tick at a time across view ticks and in one jump across the empty
//! stretches between them, until no order outside the price could improve
//! the fill:
//!
//! ```text
//! buy_over(i+1) <= sell_under(i)   and   buy_over(i) >= sell_under(i-1)
//! ```
//!
//! where `buy_over` / `sell_under` are inclusive cumulative volumes read from
//! the [`OrderView`]. The search is deterministic: same view, same price.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tickmatch_types::{Dec, Result, Rounding, TickGrid, TickIndex};
use tracing::debug;

use crate::OrderView;

/// Which way the price has to move from the midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceDirection {
    Increasing,
    Decreasing,
    Staying,
}

impl fmt::Display for PriceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Staying => write!(f, "staying"),
        }
    }
}

/// Result of clearing price computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingResult {
    /// The uniform clearing price (a tick).
    pub price: Dec,
    pub direction: PriceDirection,
    /// Best buy and best sell the search started from.
    pub highest_buy: Dec,
    pub lowest_sell: Dec,
    /// Number of ticks walked.
    pub steps: u64,
}

/// Midpoint of the best prices and the direction the price must move.
pub fn price_direction(
    view: &OrderView,
    highest_buy: Dec,
    lowest_sell: Dec,
) -> Result<(Dec, PriceDirection)> {
    let mid = highest_buy
        .checked_add(lowest_sell)?
        .quo_int(2, Rounding::RoundNearestEven)?;
    let buy = view.buy_amount_over(mid, true);
    let sell = view.sell_amount_under(mid, true);
    let direction = match buy.cmp(&sell) {
        std::cmp::Ordering::Greater => PriceDirection::Increasing,
        std::cmp::Ordering::Less => PriceDirection::Decreasing,
        std::cmp::Ordering::Equal => PriceDirection::Staying,
    };
    Ok((mid, direction))
}

/// Cumulative volumes per visited tick index, for one search.
struct WalkCache<'v> {
    view: &'v OrderView,
    grid: &'v TickGrid,
    volumes: BTreeMap<TickIndex, (Dec, Dec)>,
}

impl<'v> WalkCache<'v> {
    fn new(view: &'v OrderView, grid: &'v TickGrid) -> Self {
        Self {
            view,
            grid,
            volumes: BTreeMap::new(),
        }
    }

    /// `(buy_over, sell_under)` at tick index `i`.
    fn at(&mut self, i: TickIndex) -> Result<(Dec, Dec)> {
        if let Some(v) = self.volumes.get(&i) {
            return Ok(*v);
        }
        let tick = self.grid.index_to_tick(i)?;
        let v = (
            self.view.buy_amount_over(tick, true),
            self.view.sell_amount_under(tick, true),
        );
        self.volumes.insert(i, v);
        Ok(v)
    }

    fn buy_over(&mut self, i: TickIndex) -> Result<Dec> {
        if i > self.grid.highest_index() {
            return Ok(Dec::ZERO);
        }
        Ok(self.at(i)?.0)
    }

    fn sell_under(&mut self, i: Option<TickIndex>) -> Result<Dec> {
        match i {
            Some(i) => Ok(self.at(i)?.1),
            None => Ok(Dec::ZERO),
        }
    }

    fn balanced(&mut self, i: TickIndex) -> Result<bool> {
        Ok(self.buy_over(i + 1)? <= self.sell_under(Some(i))?
            && self.buy_over(i)? >= self.sell_under(i.checked_sub(1))?)
    }
}

/// Find the clearing price of a crossing view.
///
/// `highest_buy >= lowest_sell` must hold; the caller reports
/// `Unmatchable` otherwise.
pub fn find_clearing_price(
    view: &OrderView,
    grid: &TickGrid,
    highest_buy: Dec,
    lowest_sell: Dec,
) -> Result<ClearingResult> {
    let (mid, direction) = price_direction(view, highest_buy, lowest_sell)?;
    debug!(%mid, %direction, "price direction");

    let (price, steps) = match direction {
        PriceDirection::Staying => (grid.round_price(mid)?, 0),
        PriceDirection::Increasing => {
            let start = grid.tick_to_index(grid.price_to_down_tick(mid)?)?;
            walk(view, grid, start, true)?
        }
        PriceDirection::Decreasing => {
            let start = grid.tick_to_index(grid.price_to_up_tick(mid)?)?;
            walk(view, grid, start, false)?
        }
    };

    Ok(ClearingResult {
        price,
        direction,
        highest_buy,
        lowest_sell,
        steps,
    })
}

fn walk(view: &OrderView, grid: &TickGrid, start: TickIndex, up: bool) -> Result<(Dec, u64)> {
    let mut cache = WalkCache::new(view, grid);
    let mut i = start;
    let mut steps = 0u64;
    loop {
        if cache.balanced(i)? {
            debug!(index = i, steps, "clearing tick found");
            break;
        }
        if let Some(far) = flat_run_end(view, grid, i, up)? {
            steps += far.abs_diff(i);
            i = far;
        }
        let next = if up {
            (i < grid.highest_index()).then_some(i + 1)
        } else {
            i.checked_sub(1)
        };
        let Some(next) = next else {
            debug!(index = i, "walk stopped at the grid boundary");
            break;
        };
        let driving = if up {
            cache.buy_over(next)?
        } else {
            cache.sell_under(Some(next))?
        };
        if driving.is_zero() {
            debug!(index = i, "walk stopped: no volume beyond this tick");
            break;
        }
        i = next;
        steps += 1;
    }
    Ok((grid.index_to_tick(i)?, steps))
}

/// Last index of the run of ticks starting at `i` on which every volume the
/// balance test reads stays the same as at `i`, if the run is longer than
/// one tick. Volumes only change on view ticks, so the run ends two ticks
/// short of the next one.
fn flat_run_end(
    view: &OrderView,
    grid: &TickGrid,
    i: TickIndex,
    up: bool,
) -> Result<Option<TickIndex>> {
    if up {
        let from = grid.index_to_tick(i.saturating_sub(1))?;
        let Some(next) = view.nearest_tick_at_or_above(from) else {
            return Ok(None);
        };
        let next = grid.tick_to_index(next)?;
        Ok((next >= i + 3).then(|| next - 2))
    } else {
        let from = grid.index_to_tick((i + 1).min(grid.highest_index()))?;
        let Some(next) = view.nearest_tick_at_or_below(from) else {
            return Ok(None);
        };
        let next = grid.tick_to_index(next)?;
        Ok((next + 3 <= i).then(|| next + 2))
    }
}

#[cfg(test)]
mod tests {
    use tickmatch_types::Order;

    use super::*;
    use crate::OrderBook;

    fn d(s: &str) -> Dec {
        Dec::parse(s).unwrap()
    }

    fn clear(orders: Vec<Order>) -> ClearingResult {
        clear_on(&TickGrid::new(4).unwrap(), orders)
    }

    fn clear_on(grid: &TickGrid, orders: Vec<Order>) -> ClearingResult {
        let mut book = OrderBook::new(grid.clone());
        book.add_orders(orders).unwrap();
        let view = book.make_view().unwrap();
        let hb = view.highest_buy_price().unwrap();
        let ls = view.lowest_sell_price().unwrap();
        find_clearing_price(&view, grid, hb, ls).unwrap()
    }

    #[test]
    fn exact_cross_stays() {
        let result = clear(vec![Order::dummy_buy(1, "1", 10), Order::dummy_sell(2, "1", 10)]);
        assert_eq!(result.direction, PriceDirection::Staying);
        assert_eq!(result.price, d("1"));
    }

    #[test]
    fn balanced_spread_clears_at_midpoint() {
        let result = clear(vec![
            Order::dummy_buy(1, "1.1", 10000),
            Order::dummy_sell(2, "0.9", 10000),
        ]);
        assert_eq!(result.direction, PriceDirection::Staying);
        assert_eq!(result.price, d("1"));
    }

    #[test]
    fn midpoint_rounds_to_the_even_tick() {
        // mid = 1.00015, halfway between 1.0001 (odd index) and 1.0002
        let result = clear(vec![
            Order::dummy_buy(1, "1.0002", 5),
            Order::dummy_sell(2, "1.0001", 5),
        ]);
        assert_eq!(result.direction, PriceDirection::Staying);
        assert_eq!(result.price, d("1.0002"));
    }

    #[test]
    fn excess_demand_walks_up() {
        // at mid 1.0 demand 30 > supply 10; price rises to the 1.05 buy
        let result = clear(vec![
            Order::dummy_buy(1, "1.1", 10),
            Order::dummy_buy(2, "1.05", 20),
            Order::dummy_sell(3, "0.9", 10),
            Order::dummy_sell(4, "1.05", 25),
        ]);
        assert_eq!(result.direction, PriceDirection::Increasing);
        assert_eq!(result.price, d("1.05"));
        assert!(result.steps > 0);
    }

    #[test]
    fn excess_supply_walks_down() {
        let result = clear(vec![
            Order::dummy_buy(1, "1.1", 10),
            Order::dummy_sell(2, "0.9", 10),
            Order::dummy_sell(3, "0.95", 30),
        ]);
        assert_eq!(result.direction, PriceDirection::Decreasing);
        // supply at or below 0.95 is 40 > demand 10, at 0.94999 it is 10
        assert_eq!(result.price, d("0.95"));
    }

    #[test]
    fn fine_grid_walk_crosses_empty_stretches_at_once() {
        let grid = TickGrid::new(12).unwrap();
        let result = clear_on(
            &grid,
            vec![
                Order::dummy_buy(1, "1.1", 10),
                Order::dummy_buy(2, "1.05", 20),
                Order::dummy_sell(3, "0.9", 10),
                Order::dummy_sell(4, "1.05", 25),
            ],
        );
        assert_eq!(result.direction, PriceDirection::Increasing);
        assert_eq!(result.price, d("1.05"));
        let start = grid.tick_to_index(d("1")).unwrap();
        let end = grid.tick_to_index(d("1.05")).unwrap();
        assert_eq!(result.steps, end - start);
    }
}
