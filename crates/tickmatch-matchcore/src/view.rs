//! Cumulative-volume view over an order source.
//!
//! Built once per pass: for each side, the ticks best price first with the
//! running sum of volume at that tick or better. Range queries are a binary
//! search into those sums.

use serde::Serialize;
use tickmatch_types::{Dec, DexError, Direction, Result};

use crate::source::OrderSource;

/// One tick of the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewTick {
    pub price: Dec,
    /// Volume at exactly this tick.
    pub amount: Dec,
    /// Volume at this tick or better.
    pub cumulative: Dec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderView {
    /// Highest price first.
    buys: Vec<ViewTick>,
    /// Lowest price first.
    sells: Vec<ViewTick>,
}

impl OrderView {
    pub fn build(source: &mut OrderSource<'_>) -> Result<Self> {
        Ok(Self {
            buys: accumulate(Direction::Buy, source.ticks(Direction::Buy)?)?,
            sells: accumulate(Direction::Sell, source.ticks(Direction::Sell)?)?,
        })
    }

    /// Ticks of one side, best first.
    #[must_use]
    pub fn ticks(&self, direction: Direction) -> &[ViewTick] {
        match direction {
            Direction::Buy => &self.buys,
            Direction::Sell => &self.sells,
        }
    }

    /// Best buy tick with unconsumed volume.
    #[must_use]
    pub fn highest_buy_price(&self) -> Option<Dec> {
        self.buys
            .iter()
            .find(|t| t.cumulative.is_positive())
            .map(|t| t.price)
    }

    /// Best sell tick with unconsumed volume.
    #[must_use]
    pub fn lowest_sell_price(&self) -> Option<Dec> {
        self.sells
            .iter()
            .find(|t| t.cumulative.is_positive())
            .map(|t| t.price)
    }

    /// Buy volume at prices above `price` (or at it, if `inclusive`).
    #[must_use]
    pub fn buy_amount_over(&self, price: Dec, inclusive: bool) -> Dec {
        let end = self
            .buys
            .partition_point(|t| t.price > price || (inclusive && t.price == price));
        end.checked_sub(1)
            .map_or(Dec::ZERO, |last| self.buys[last].cumulative)
    }

    /// Sell volume at prices below `price` (or at it, if `inclusive`).
    #[must_use]
    pub fn sell_amount_under(&self, price: Dec, inclusive: bool) -> Dec {
        let end = self
            .sells
            .partition_point(|t| t.price < price || (inclusive && t.price == price));
        end.checked_sub(1)
            .map_or(Dec::ZERO, |last| self.sells[last].cumulative)
    }

    /// Nearest tick of either side at or above `price`.
    #[must_use]
    pub fn nearest_tick_at_or_above(&self, price: Dec) -> Option<Dec> {
        let buy = self
            .buys
            .partition_point(|t| t.price >= price)
            .checked_sub(1)
            .map(|i| self.buys[i].price);
        let sell = self
            .sells
            .get(self.sells.partition_point(|t| t.price < price))
            .map(|t| t.price);
        match (buy, sell) {
            (Some(b), Some(s)) => Some(b.min(s)),
            (b, s) => b.or(s),
        }
    }

    /// Nearest tick of either side at or below `price`.
    #[must_use]
    pub fn nearest_tick_at_or_below(&self, price: Dec) -> Option<Dec> {
        let buy = self
            .buys
            .get(self.buys.partition_point(|t| t.price > price))
            .map(|t| t.price);
        let sell = self
            .sells
            .partition_point(|t| t.price <= price)
            .checked_sub(1)
            .map(|i| self.sells[i].price);
        match (buy, sell) {
            (Some(b), Some(s)) => Some(b.max(s)),
            (b, s) => b.or(s),
        }
    }

    #[must_use]
    pub fn amount_at_or_better(&self, direction: Direction, price: Dec, inclusive: bool) -> Dec {
        match direction {
            Direction::Buy => self.buy_amount_over(price, inclusive),
            Direction::Sell => self.sell_amount_under(price, inclusive),
        }
    }

    /// Consume the crossing region without touching individual orders.
    ///
    /// The buy boundary is the first tick whose cumulative demand exceeds
    /// the supply at or below its price, and symmetrically for sells. The
    /// volume both sides can fully clear before their boundary is taken off
    /// every cumulative sum, flooring at zero. Returns that volume.
    pub fn match_structural(&mut self) -> Result<Dec> {
        if self.buys.is_empty() || self.sells.is_empty() {
            return Ok(Dec::ZERO);
        }
        let buy_idx = self
            .buys
            .partition_point(|t| t.cumulative <= self.sell_amount_under(t.price, true));
        let sell_idx = self
            .sells
            .partition_point(|t| t.cumulative <= self.buy_amount_over(t.price, true));
        let mut matched = Dec::ZERO;
        if let Some(last) = buy_idx.checked_sub(1) {
            matched = matched.max(self.buys[last].cumulative);
        }
        if let Some(last) = sell_idx.checked_sub(1) {
            matched = matched.max(self.sells[last].cumulative);
        }
        if matched.is_zero() {
            return Ok(matched);
        }
        for tick in self.buys.iter_mut().chain(self.sells.iter_mut()) {
            tick.cumulative = tick.cumulative.checked_sub(matched)?.max(Dec::ZERO);
        }
        Ok(matched)
    }
}

fn accumulate(direction: Direction, ticks: Vec<(Dec, Dec)>) -> Result<Vec<ViewTick>> {
    let mut out: Vec<ViewTick> = Vec::with_capacity(ticks.len());
    let mut running = Dec::ZERO;
    for (price, amount) in ticks {
        if let Some(prev) = out.last() {
            let sorted = match direction {
                Direction::Buy => prev.price > price,
                Direction::Sell => prev.price < price,
            };
            if !sorted {
                return Err(DexError::invariant(format!(
                    "{direction} ticks out of order at {price}"
                )));
            }
        }
        if amount.is_negative() {
            return Err(DexError::invariant(format!(
                "negative {direction} volume {amount} at {price}"
            )));
        }
        running = running.checked_add(amount)?;
        out.push(ViewTick {
            price,
            amount,
            cumulative: running,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use tickmatch_types::{Order, TickGrid};

    use super::*;
    use crate::OrderBook;

    fn d(s: &str) -> Dec {
        Dec::parse(s).unwrap()
    }

    fn book(orders: Vec<Order>) -> OrderBook {
        let mut book = OrderBook::new(TickGrid::new(4).unwrap());
        book.add_orders(orders).unwrap();
        book
    }

    #[test]
    fn view_matches_book_queries() {
        let book = book(vec![
            Order::dummy_buy(1, "1.1", 10),
            Order::dummy_buy(2, "1", 20),
            Order::dummy_sell(3, "0.9", 5),
            Order::dummy_sell(4, "1", 7),
        ]);
        let view = book.make_view().unwrap();
        for price in ["0.8", "0.9", "1", "1.05", "1.1", "1.2"] {
            for inclusive in [true, false] {
                assert_eq!(
                    view.buy_amount_over(d(price), inclusive),
                    book.buy_amount_over(d(price), inclusive).unwrap()
                );
                assert_eq!(
                    view.sell_amount_under(d(price), inclusive),
                    book.sell_amount_under(d(price), inclusive).unwrap()
                );
            }
        }
        assert_eq!(view.highest_buy_price(), Some(d("1.1")));
        assert_eq!(view.lowest_sell_price(), Some(d("0.9")));
    }

    #[test]
    fn nearest_ticks_span_both_sides() {
        let view = book(vec![
            Order::dummy_buy(1, "1.1", 10),
            Order::dummy_buy(2, "0.95", 20),
            Order::dummy_sell(3, "0.9", 5),
            Order::dummy_sell(4, "1", 7),
        ])
        .make_view()
        .unwrap();
        assert_eq!(view.nearest_tick_at_or_above(d("0.91")), Some(d("0.95")));
        assert_eq!(view.nearest_tick_at_or_above(d("1")), Some(d("1")));
        assert_eq!(view.nearest_tick_at_or_above(d("1.0001")), Some(d("1.1")));
        assert_eq!(view.nearest_tick_at_or_above(d("1.2")), None);
        assert_eq!(view.nearest_tick_at_or_below(d("0.99")), Some(d("0.95")));
        assert_eq!(view.nearest_tick_at_or_below(d("0.94")), Some(d("0.9")));
        assert_eq!(view.nearest_tick_at_or_below(d("2")), Some(d("1.1")));
        assert_eq!(view.nearest_tick_at_or_below(d("0.5")), None);
    }

    #[test]
    fn cumulative_sums_grow_away_from_best() {
        let view = book(vec![
            Order::dummy_buy(1, "1", 3),
            Order::dummy_buy(2, "0.99", 4),
            Order::dummy_buy(3, "0.98", 5),
        ])
        .make_view()
        .unwrap();
        let sums: Vec<Dec> = view.ticks(Direction::Buy).iter().map(|t| t.cumulative).collect();
        assert_eq!(sums, vec![d("3"), d("7"), d("12")]);
    }

    #[test]
    fn match_consumes_the_crossing_volume() {
        let mut view = book(vec![
            Order::dummy_buy(1, "1.1", 10),
            Order::dummy_buy(2, "1", 10),
            Order::dummy_sell(3, "1", 15),
            Order::dummy_sell(4, "1.2", 5),
        ])
        .make_view()
        .unwrap();
        assert_eq!(view.match_structural().unwrap(), d("15"));
        assert_eq!(view.buy_amount_over(d("1"), true), d("5"));
        assert!(view.sell_amount_under(d("1"), true).is_zero());
        assert_eq!(view.sell_amount_under(d("1.2"), true), d("5"));
        assert_eq!(view.lowest_sell_price(), Some(d("1.2")));
        // consumed sums never go negative
        assert!(view
            .ticks(Direction::Sell)
            .iter()
            .all(|t| !t.cumulative.is_negative()));
    }

    #[test]
    fn match_without_crossing_is_a_no_op() {
        let mut view = book(vec![Order::dummy_buy(1, "0.9", 10), Order::dummy_sell(2, "1.1", 10)])
            .make_view()
            .unwrap();
        let before = view.clone();
        assert!(view.match_structural().unwrap().is_zero());
        assert_eq!(view, before);
    }

    #[test]
    fn unsorted_ticks_are_an_invariant_violation() {
        let result = accumulate(Direction::Sell, vec![(d("1.1"), d("1")), (d("1"), d("1"))]);
        assert!(matches!(result, Err(DexError::InvariantViolation { .. })));
    }
}
