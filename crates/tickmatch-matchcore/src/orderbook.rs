//! The order book for a single trading pair.
//!
//! Orders live in one contiguous arena and are addressed by slot. Each side
//! keeps a strictly sorted array of [`TickLevel`]s:
//! - **Buys**: descending by price (best first)
//! - **Sells**: ascending by price (best first)
//!
//! Locating or creating a level is a binary search over the array.
//! Cumulative queries read prefix sums over the levels, rebuilt on the first
//! query after the book changes.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use tickmatch_types::{
    Dec, DexError, Direction, Fill, Order, OrderId, OrderRef, Result, TickGrid,
};

use crate::source::OrderSource;
use crate::tick_level::TickLevel;
use crate::view::OrderView;

/// The order book for one pair.
#[derive(Debug, Clone)]
pub struct OrderBook {
    grid: TickGrid,
    orders: Vec<Order>,
    /// `OrderId -> arena slot`.
    index: BTreeMap<OrderId, usize>,
    /// Highest price first.
    buys: Vec<TickLevel>,
    /// Lowest price first.
    sells: Vec<TickLevel>,
    prefix_sums: OnceLock<OrderView>,
}

impl OrderBook {
    /// Create an empty book whose orders must lie on `grid`.
    #[must_use]
    pub fn new(grid: TickGrid) -> Self {
        Self {
            grid,
            orders: Vec::new(),
            index: BTreeMap::new(),
            buys: Vec::new(),
            sells: Vec::new(),
            prefix_sums: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn grid(&self) -> &TickGrid {
        &self.grid
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Insert an order at its tick, creating the tick if needed.
    pub fn add_order(&mut self, order: Order) -> Result<()> {
        order.validate()?;
        if self.index.contains_key(&order.id) {
            return Err(DexError::DuplicateOrder(order.id));
        }
        if !self.grid.is_tick(order.price) {
            return Err(DexError::invalid(format!(
                "{}: price {} is not a tick at precision {}",
                order.id,
                order.price,
                self.grid.precision()
            )));
        }

        let slot = self.orders.len();
        let (direction, price, id) = (order.direction, order.price, order.id);
        let levels = match direction {
            Direction::Buy => &mut self.buys,
            Direction::Sell => &mut self.sells,
        };
        let found = levels.binary_search_by(|level| match direction {
            Direction::Buy => price.cmp(&level.price),
            Direction::Sell => level.price.cmp(&price),
        });
        let pos = match found {
            Ok(pos) => pos,
            Err(pos) => {
                levels.insert(pos, TickLevel::new(price, direction));
                pos
            }
        };
        levels[pos].push_back(slot);
        self.orders.push(order);
        self.index.insert(id, slot);
        self.prefix_sums.take();
        Ok(())
    }

    /// Insert an order only if its price lies inside `[lower, upper]`.
    pub fn add_order_within(&mut self, order: Order, limits: (Dec, Dec)) -> Result<()> {
        let (lower, upper) = limits;
        if order.price < lower || order.price > upper {
            return Err(DexError::invalid(format!(
                "{}: price {} outside the price limits [{lower}, {upper}]",
                order.id, order.price
            )));
        }
        self.add_order(order)
    }

    /// Insert several orders, stopping at the first failure.
    pub fn add_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<()> {
        for order in orders {
            self.add_order(order)?;
        }
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Best buy tick with a nonzero open amount.
    pub fn highest_buy_price(&self) -> Result<Option<Dec>> {
        self.best_open_price(&self.buys)
    }

    /// Best sell tick with a nonzero open amount.
    pub fn lowest_sell_price(&self) -> Result<Option<Dec>> {
        self.best_open_price(&self.sells)
    }

    fn best_open_price(&self, levels: &[TickLevel]) -> Result<Option<Dec>> {
        for level in levels {
            if level.open_amount(&self.orders)?.is_positive() {
                return Ok(Some(level.price));
            }
        }
        Ok(None)
    }

    /// Open buy amount at prices above `price` (or at it, if `inclusive`).
    pub fn buy_amount_over(&self, price: Dec, inclusive: bool) -> Result<Dec> {
        Ok(self.prefix_sums()?.buy_amount_over(price, inclusive))
    }

    /// Open sell amount at prices below `price` (or at it, if `inclusive`).
    pub fn sell_amount_under(&self, price: Dec, inclusive: bool) -> Result<Dec> {
        Ok(self.prefix_sums()?.sell_amount_under(price, inclusive))
    }

    fn prefix_sums(&self) -> Result<&OrderView> {
        if let Some(view) = self.prefix_sums.get() {
            return Ok(view);
        }
        let view = self.make_view()?;
        Ok(self.prefix_sums.get_or_init(|| view))
    }

    /// Orders resting at exactly `price`, in time priority.
    pub fn orders_at_tick(&self, direction: Direction, price: Dec) -> Vec<&Order> {
        self.level(direction, price)
            .map(|level| level.slots().iter().map(|&slot| &self.orders[slot]).collect())
            .unwrap_or_default()
    }

    fn level(&self, direction: Direction, price: Dec) -> Option<&TickLevel> {
        let levels = match direction {
            Direction::Buy => &self.buys,
            Direction::Sell => &self.sells,
        };
        levels
            .binary_search_by(|level| match direction {
                Direction::Buy => price.cmp(&level.price),
                Direction::Sell => level.price.cmp(&price),
            })
            .ok()
            .map(|pos| &levels[pos])
    }

    /// `(tick, open amount)` for every tick with open volume, best first.
    pub fn tick_amounts(&self, direction: Direction) -> Result<Vec<(Dec, Dec)>> {
        let mut out = Vec::new();
        for level in self.levels(direction) {
            let amount = level.open_amount(&self.orders)?;
            if amount.is_positive() {
                out.push((level.price, amount));
            }
        }
        Ok(out)
    }

    /// Levels of one side, best first.
    #[must_use]
    pub fn levels(&self, direction: Direction) -> &[TickLevel] {
        match direction {
            Direction::Buy => &self.buys,
            Direction::Sell => &self.sells,
        }
    }

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.index.get(&id).map(|&slot| &self.orders[slot])
    }

    /// Total number of orders currently in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Returns `true` if the book has no orders on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Prefix-sum view of this book alone.
    pub fn make_view(&self) -> Result<OrderView> {
        OrderView::build(&mut OrderSource::Book(self))
    }

    // =================================================================
    // Settlement
    // =================================================================

    /// Apply a settled fill to the order it names.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<()> {
        let OrderRef::Order(id) = fill.order else {
            return Err(DexError::invalid(format!(
                "{} is not a book order",
                fill.order
            )));
        };
        let slot = *self.index.get(&id).ok_or(DexError::OrderNotFound(id))?;
        let order = &mut self.orders[slot];
        if order.direction != fill.direction {
            return Err(DexError::invalid(format!(
                "{id}: {} fill applied to a {} order",
                fill.direction, order.direction
            )));
        }
        let open = order.open_amount.checked_sub(fill.filled_amount)?;
        let (spent, got) = match fill.direction {
            Direction::Buy => (fill.quote_amount, fill.filled_amount),
            Direction::Sell => (fill.filled_amount, fill.quote_amount),
        };
        let remaining_offer = order.remaining_offer.checked_sub(spent)?;
        if open.is_negative() || remaining_offer.is_negative() {
            return Err(DexError::invariant(format!(
                "{id}: fill of {} overdraws the order",
                fill.filled_amount
            )));
        }
        order.open_amount = open;
        order.remaining_offer = remaining_offer;
        order.received = order.received.checked_add(got)?;
        order.matched = true;
        self.prefix_sums.take();
        Ok(())
    }

    // =================================================================
    // Maintenance
    // =================================================================

    /// Hand every order back to the caller, emptying the book.
    pub fn drain_all(&mut self) -> Vec<Order> {
        self.index.clear();
        self.buys.clear();
        self.sells.clear();
        self.prefix_sums.take();
        std::mem::take(&mut self.orders)
    }
}
