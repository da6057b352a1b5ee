//! Order sources: the book, a pool, or a merge of several.
//!
//! Every source answers the same queries (best prices, cumulative amount at
//! or better than a price, orders at a tick). The set of kinds is closed,
//! so they are variants of one enum and [`OrderSource::Merged`] folds over
//! its children.
//!
//! A pool source only offers volume on ticks inside the price limits around
//! the reference price. Its cumulative curve values are memoized per tick
//! for the lifetime of the source, which is one matching pass.

use std::collections::BTreeMap;

use tickmatch_amm::Pool;
use tickmatch_types::{Dec, DexError, Direction, OrderRef, Result, TickGrid};
use tracing::debug;

use crate::OrderBook;

/// One matchable order as seen through a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrder {
    pub order: OrderRef,
    pub direction: Direction,
    /// Tick the order rests on.
    pub price: Dec,
    /// Open base amount at this tick.
    pub amount: Dec,
    /// Escrow still available: quote units for a buy, base units for a sell.
    /// For a pool this is the reserve backing all of its ticks.
    pub offer: Dec,
    /// Time priority for book orders, pool id for pools.
    pub sequence: u64,
}

impl SourceOrder {
    /// Priority key within a tick: book orders by sequence, then pools by id.
    fn priority(&self) -> (bool, u64, OrderRef) {
        (self.order.is_pool(), self.sequence, self.order)
    }
}

pub enum OrderSource<'a> {
    Book(&'a OrderBook),
    Pool(PoolOrderSource<'a>),
    Merged(Vec<OrderSource<'a>>),
}

impl OrderSource<'_> {
    pub fn highest_buy_price(&mut self) -> Result<Option<Dec>> {
        match self {
            Self::Book(book) => book.highest_buy_price(),
            Self::Pool(pool) => pool.highest_buy_price(),
            Self::Merged(sources) => fold_best(sources, |s| s.highest_buy_price(), Dec::max),
        }
    }

    pub fn lowest_sell_price(&mut self) -> Result<Option<Dec>> {
        match self {
            Self::Book(book) => book.lowest_sell_price(),
            Self::Pool(pool) => pool.lowest_sell_price(),
            Self::Merged(sources) => fold_best(sources, |s| s.lowest_sell_price(), Dec::min),
        }
    }

    /// Cumulative amount at `price` or better for `direction`.
    pub fn amount_at_or_better(
        &mut self,
        direction: Direction,
        price: Dec,
        inclusive: bool,
    ) -> Result<Dec> {
        match self {
            Self::Book(book) => match direction {
                Direction::Buy => book.buy_amount_over(price, inclusive),
                Direction::Sell => book.sell_amount_under(price, inclusive),
            },
            Self::Pool(pool) => match direction {
                Direction::Buy => pool.buy_amount_over(price, inclusive),
                Direction::Sell => pool.sell_amount_under(price, inclusive),
            },
            Self::Merged(sources) => sources.iter_mut().try_fold(Dec::ZERO, |acc, s| {
                acc.checked_add(s.amount_at_or_better(direction, price, inclusive)?)
            }),
        }
    }

    /// Orders with a nonzero amount at exactly `price`, in priority order.
    pub fn orders_at_tick(&mut self, direction: Direction, price: Dec) -> Result<Vec<SourceOrder>> {
        let mut orders = match self {
            Self::Book(book) => book
                .orders_at_tick(direction, price)
                .into_iter()
                .filter(|o| o.open_amount.is_positive())
                .map(|o| SourceOrder {
                    order: OrderRef::Order(o.id),
                    direction,
                    price,
                    amount: o.open_amount,
                    offer: o.remaining_offer,
                    sequence: o.sequence,
                })
                .collect(),
            Self::Pool(pool) => pool.orders_at_tick(direction, price)?,
            Self::Merged(sources) => {
                let mut all = Vec::new();
                for source in sources {
                    all.extend(source.orders_at_tick(direction, price)?);
                }
                all
            }
        };
        orders.sort_by_key(SourceOrder::priority);
        Ok(orders)
    }

    /// `(tick, amount)` for every tick with volume, best price first.
    pub fn ticks(&mut self, direction: Direction) -> Result<Vec<(Dec, Dec)>> {
        match self {
            Self::Book(book) => book.tick_amounts(direction),
            Self::Pool(pool) => pool.ticks(direction),
            Self::Merged(sources) => {
                let mut merged: BTreeMap<Dec, Dec> = BTreeMap::new();
                for source in sources {
                    for (price, amount) in source.ticks(direction)? {
                        let slot = merged.entry(price).or_insert(Dec::ZERO);
                        *slot = slot.checked_add(amount)?;
                    }
                }
                Ok(match direction {
                    Direction::Buy => merged.into_iter().rev().collect(),
                    Direction::Sell => merged.into_iter().collect(),
                })
            }
        }
    }
}

fn fold_best<'a>(
    sources: &mut [OrderSource<'a>],
    mut query: impl FnMut(&mut OrderSource<'a>) -> Result<Option<Dec>>,
    pick: fn(Dec, Dec) -> Dec,
) -> Result<Option<Dec>> {
    let mut best = None;
    for source in sources {
        if let Some(price) = query(source)? {
            best = Some(best.map_or(price, |b| pick(b, price)));
        }
    }
    Ok(best)
}

/// A pool seen as an order source for one matching pass.
pub struct PoolOrderSource<'a> {
    pool: &'a Pool,
    grid: &'a TickGrid,
    lower: Dec,
    upper: Dec,
    /// Highest tick the pool buys on.
    buy_top: Option<Dec>,
    /// Lowest tick the pool sells on.
    sell_bottom: Option<Dec>,
    buy_over: BTreeMap<Dec, Dec>,
    sell_under: BTreeMap<Dec, Dec>,
}

impl<'a> PoolOrderSource<'a> {
    /// `None` for a depleted pool. The price limits are taken around
    /// `reference`, or around the pool's own price when the pair has not
    /// traded yet; a pool priced off the grid then offers nothing.
    pub fn new(
        pool: &'a Pool,
        grid: &'a TickGrid,
        reference: Option<Dec>,
        max_price_limit_ratio: Dec,
    ) -> Result<Option<Self>> {
        if pool.is_depleted() {
            return Ok(None);
        }
        let pool_price = pool.price()?;
        let lowest = grid.lowest_tick();
        let highest = grid.highest_tick();
        if reference.is_none() && (pool_price < lowest || pool_price > highest) {
            debug!(pool = %pool.id(), price = %pool_price, "pool price off the tick grid");
            return Ok(None);
        }
        let (lower, upper) =
            grid.price_limits(reference.unwrap_or(pool_price), max_price_limit_ratio)?;

        let below = if pool_price <= lowest {
            None
        } else if pool_price > highest {
            Some(highest)
        } else {
            let tick = grid.price_to_down_tick(pool_price)?;
            Some(if tick == pool_price { grid.down_tick(tick)? } else { tick })
        };
        let above = if pool_price >= highest {
            None
        } else if pool_price < lowest {
            Some(lowest)
        } else {
            let tick = grid.price_to_up_tick(pool_price)?;
            Some(if tick == pool_price { grid.up_tick(tick)? } else { tick })
        };

        Ok(Some(Self {
            pool,
            grid,
            lower,
            upper,
            buy_top: below.map(|t| t.min(upper)).filter(|t| *t >= lower),
            sell_bottom: above.map(|t| t.max(lower)).filter(|t| *t <= upper),
            buy_over: BTreeMap::new(),
            sell_under: BTreeMap::new(),
        }))
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        self.pool
    }

    /// `(lower, upper)` price limits this source offers volume within.
    #[must_use]
    pub fn limits(&self) -> (Dec, Dec) {
        (self.lower, self.upper)
    }

    // =================================================================
    // Memoized curve
    // =================================================================

    fn over(&mut self, tick: Dec) -> Result<Dec> {
        if let Some(amount) = self.buy_over.get(&tick) {
            return Ok(*amount);
        }
        let amount = self.pool.buy_amount_over(tick)?;
        self.buy_over.insert(tick, amount);
        Ok(amount)
    }

    fn under(&mut self, tick: Dec) -> Result<Dec> {
        if let Some(amount) = self.sell_under.get(&tick) {
            return Ok(*amount);
        }
        let amount = self.pool.sell_amount_under(tick)?;
        self.sell_under.insert(tick, amount);
        Ok(amount)
    }

    /// Buy volume the limits cut off above `top`.
    fn over_above(&mut self, top: Dec) -> Result<Dec> {
        if top >= self.grid.highest_tick() {
            return Ok(Dec::ZERO);
        }
        let next = self.grid.up_tick(top)?;
        self.over(next)
    }

    /// Sell volume the limits cut off below `bottom`.
    fn under_below(&mut self, bottom: Dec) -> Result<Dec> {
        if bottom <= self.grid.lowest_tick() {
            return Ok(Dec::ZERO);
        }
        let next = self.grid.down_tick(bottom)?;
        self.under(next)
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Cumulative buy volume on ticks `>= price` (or `>`).
    pub fn buy_amount_over(&mut self, price: Dec, inclusive: bool) -> Result<Dec> {
        let Some(top) = self.buy_top else {
            return Ok(Dec::ZERO);
        };
        let start = if price < self.grid.lowest_tick() {
            self.grid.lowest_tick()
        } else {
            let tick = self.grid.price_to_up_tick(price)?;
            if inclusive || tick != price {
                tick
            } else if tick >= self.grid.highest_tick() {
                return Ok(Dec::ZERO);
            } else {
                self.grid.up_tick(tick)?
            }
        };
        let start = start.max(self.lower);
        if start > top {
            return Ok(Dec::ZERO);
        }
        let total = self.over(start)?;
        total.checked_sub(self.over_above(top)?)
    }

    /// Cumulative sell volume on ticks `<= price` (or `<`).
    pub fn sell_amount_under(&mut self, price: Dec, inclusive: bool) -> Result<Dec> {
        let Some(bottom) = self.sell_bottom else {
            return Ok(Dec::ZERO);
        };
        if price < self.grid.lowest_tick() {
            return Ok(Dec::ZERO);
        }
        let tick = self.grid.price_to_down_tick(price)?;
        let end = if inclusive || tick != price {
            tick
        } else if tick <= self.grid.lowest_tick() {
            return Ok(Dec::ZERO);
        } else {
            self.grid.down_tick(tick)?
        };
        let end = end.min(self.upper);
        if end < bottom {
            return Ok(Dec::ZERO);
        }
        let total = self.under(end)?;
        total.checked_sub(self.under_below(bottom)?)
    }

    /// Marginal volume on exactly `tick`.
    pub fn providable_amount_at_tick(&mut self, direction: Direction, tick: Dec) -> Result<Dec> {
        let marginal = match direction {
            Direction::Buy => {
                let Some(top) = self.buy_top else {
                    return Ok(Dec::ZERO);
                };
                if tick > top || tick < self.lower {
                    return Ok(Dec::ZERO);
                }
                let here = self.over(tick)?;
                here.checked_sub(self.over_above(tick)?)?
            }
            Direction::Sell => {
                let Some(bottom) = self.sell_bottom else {
                    return Ok(Dec::ZERO);
                };
                if tick < bottom || tick > self.upper {
                    return Ok(Dec::ZERO);
                }
                let here = self.under(tick)?;
                here.checked_sub(self.under_below(tick)?)?
            }
        };
        if marginal.is_negative() {
            return Err(DexError::invariant(format!(
                "{} offers negative volume {marginal} at {tick}",
                self.pool.id()
            )));
        }
        Ok(marginal)
    }

    /// Highest tick with buy volume: binary search on the cumulative curve.
    pub fn highest_buy_price(&mut self) -> Result<Option<Dec>> {
        let Some(top) = self.buy_top else {
            return Ok(None);
        };
        let lower = self.lower;
        if self.buy_amount_over(lower, true)?.is_zero() {
            return Ok(None);
        }
        let (mut lo, mut hi) = (self.grid.tick_to_index(lower)?, self.grid.tick_to_index(top)?);
        // Invariant: volume at or above `lo` is positive.
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            let tick = self.grid.index_to_tick(mid)?;
            if self.buy_amount_over(tick, true)?.is_positive() {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        self.grid.index_to_tick(lo).map(Some)
    }

    /// Lowest tick with sell volume.
    pub fn lowest_sell_price(&mut self) -> Result<Option<Dec>> {
        let Some(bottom) = self.sell_bottom else {
            return Ok(None);
        };
        let upper = self.upper;
        if self.sell_amount_under(upper, true)?.is_zero() {
            return Ok(None);
        }
        let (mut lo, mut hi) = (
            self.grid.tick_to_index(bottom)?,
            self.grid.tick_to_index(upper)?,
        );
        // Invariant: volume at or below `hi` is positive.
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let tick = self.grid.index_to_tick(mid)?;
            if self.sell_amount_under(tick, true)?.is_positive() {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        self.grid.index_to_tick(hi).map(Some)
    }

    /// The pool's synthetic order at `price`, if it offers volume there.
    pub fn orders_at_tick(&mut self, direction: Direction, price: Dec) -> Result<Vec<SourceOrder>> {
        let amount = self.providable_amount_at_tick(direction, price)?;
        if amount.is_zero() {
            return Ok(Vec::new());
        }
        let (rx, ry) = self.pool.reserves();
        Ok(vec![SourceOrder {
            order: OrderRef::Pool(self.pool.id()),
            direction,
            price,
            amount,
            offer: match direction {
                Direction::Buy => rx,
                Direction::Sell => ry,
            },
            sequence: self.pool.id().0,
        }])
    }

    /// Every tick with volume, best first.
    ///
    /// Walks from one volume change to the next rather than tick by tick:
    /// the pool curve is inverted for one unit past the amount reached so
    /// far, and the resulting price snaps onto the grid.
    pub fn ticks(&mut self, direction: Direction) -> Result<Vec<(Dec, Dec)>> {
        let mut out = Vec::new();
        match direction {
            Direction::Buy => {
                let Some(top) = self.buy_top else {
                    return Ok(out);
                };
                let floor = self.over(self.lower)?;
                let mut reached = self.over_above(top)?;
                while reached < floor {
                    let target = reached.checked_add(Dec::ONE)?;
                    let tick = self.highest_tick_reaching(target, top)?;
                    let here = self.over(tick)?;
                    out.push((tick, here.checked_sub(reached)?));
                    reached = here;
                }
            }
            Direction::Sell => {
                let Some(bottom) = self.sell_bottom else {
                    return Ok(out);
                };
                let ceiling = self.under(self.upper)?;
                let mut reached = self.under_below(bottom)?;
                while reached < ceiling {
                    let target = reached.checked_add(Dec::ONE)?;
                    let tick = self.lowest_tick_reaching(target, bottom)?;
                    let here = self.under(tick)?;
                    out.push((tick, here.checked_sub(reached)?));
                    reached = here;
                }
            }
        }
        Ok(out)
    }

    /// Highest tick in `[lower, top]` whose cumulative buy volume is at
    /// least `target`. Requires `over(lower) >= target`.
    fn highest_tick_reaching(&mut self, target: Dec, top: Dec) -> Result<Dec> {
        let lower = self.lower;
        let mut tick = match self.pool.buy_price_for(target)? {
            Some(price) => self.grid.price_to_down_tick(price.clamp(lower, top))?,
            None => lower,
        };
        // the inverse is exact up to the curve's truncation; settle on the
        // true boundary
        while self.over(tick)? < target {
            if tick <= lower {
                return Err(DexError::invariant(format!(
                    "{} never reaches buy volume {target}",
                    self.pool.id()
                )));
            }
            tick = self.grid.down_tick(tick)?;
        }
        while tick < top {
            let next = self.grid.up_tick(tick)?;
            if self.over(next)? < target {
                break;
            }
            tick = next;
        }
        Ok(tick)
    }

    /// Lowest tick in `[bottom, upper]` whose cumulative sell volume is at
    /// least `target`. Requires `under(upper) >= target`.
    fn lowest_tick_reaching(&mut self, target: Dec, bottom: Dec) -> Result<Dec> {
        let upper = self.upper;
        let mut tick = match self.pool.sell_price_for(target)? {
            Some(price) => self.grid.price_to_up_tick(price.clamp(bottom, upper))?,
            None => upper,
        };
        while self.under(tick)? < target {
            if tick >= upper {
                return Err(DexError::invariant(format!(
                    "{} never reaches sell volume {target}",
                    self.pool.id()
                )));
            }
            tick = self.grid.up_tick(tick)?;
        }
        while tick > bottom {
            let next = self.grid.down_tick(tick)?;
            if self.under(next)? < target {
                break;
            }
            tick = next;
        }
        Ok(tick)
    }
}
