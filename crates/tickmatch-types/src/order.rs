//! Order types for the tickmatch batch auction.
//!
//! Orders are created by the ledger layer before a batch begins and only
//! mutated by settlement. `open_amount` is measured in the base asset and
//! only ever decreases.

use serde::{Deserialize, Serialize};

use crate::{Dec, DexError, OrderId, Result, TickGrid};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// How the order's price was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    /// Priced at the edge of the price limits around the last price.
    Market,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// A standing order.
///
/// - `amount` / `open_amount` are base-asset units.
/// - `remaining_offer` is the escrow still held: quote units for a buy,
///   base units for a sell.
/// - `received` is what settlement has paid out: base units for a buy,
///   quote units for a sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub direction: Direction,
    pub kind: OrderKind,
    pub price: Dec,
    pub amount: Dec,
    pub open_amount: Dec,
    pub remaining_offer: Dec,
    pub received: Dec,
    pub matched: bool,
    /// Insertion sequence; the tie-break between orders at one tick.
    pub sequence: u64,
}

impl Order {
    /// A fresh limit order with its full offer escrowed.
    pub fn new_limit(
        id: OrderId,
        direction: Direction,
        price: Dec,
        amount: Dec,
        sequence: u64,
    ) -> Result<Self> {
        if !price.is_positive() {
            return Err(DexError::invalid(format!("{id}: price {price} must be positive")));
        }
        if !amount.is_positive() || !amount.is_integer() {
            return Err(DexError::invalid(format!(
                "{id}: amount {amount} must be a positive integer"
            )));
        }
        Ok(Self {
            id,
            direction,
            kind: OrderKind::Limit,
            price,
            amount,
            open_amount: amount,
            remaining_offer: Self::offer_for(direction, price, amount)?,
            received: Dec::ZERO,
            matched: false,
            sequence,
        })
    }

    /// A market order, priced at the upper (buy) or lower (sell) price
    /// limit around `last_price`.
    pub fn new_market(
        id: OrderId,
        direction: Direction,
        amount: Dec,
        last_price: Dec,
        max_price_limit_ratio: Dec,
        grid: &TickGrid,
        sequence: u64,
    ) -> Result<Self> {
        let (lower, upper) = grid.price_limits(last_price, max_price_limit_ratio)?;
        let price = match direction {
            Direction::Buy => upper,
            Direction::Sell => lower,
        };
        let mut order = Self::new_limit(id, direction, price, amount, sequence)?;
        order.kind = OrderKind::Market;
        Ok(order)
    }

    /// Escrow needed to back `amount` at `price`: `ceil(price × amount)`
    /// quote units for a buy, `amount` base units for a sell.
    pub fn offer_for(direction: Direction, price: Dec, amount: Dec) -> Result<Dec> {
        match direction {
            Direction::Buy => price.mul_round_up(amount)?.ceil(),
            Direction::Sell => Ok(amount),
        }
    }

    /// Check the amount invariants: integral amounts and
    /// `0 <= open_amount <= amount`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("amount", self.amount),
            ("open_amount", self.open_amount),
            ("remaining_offer", self.remaining_offer),
            ("received", self.received),
        ] {
            if value.is_negative() || !value.is_integer() {
                return Err(DexError::invalid(format!(
                    "{}: {name} {value} must be a non-negative integer",
                    self.id
                )));
            }
        }
        if self.open_amount > self.amount {
            return Err(DexError::invalid(format!(
                "{}: open amount {} exceeds amount {}",
                self.id, self.open_amount, self.amount
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.open_amount.is_zero()
    }

    /// Base amount filled so far.
    pub fn filled_amount(&self) -> Result<Dec> {
        self.amount.checked_sub(self.open_amount)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// A limit buy; panics on malformed input.
    pub fn dummy_buy(id: u64, price: &str, amount: u64) -> Self {
        let price = Dec::parse(price).expect("valid price");
        Self::new_limit(OrderId(id), Direction::Buy, price, Dec::from_u128(u128::from(amount)), id)
            .expect("valid order")
    }

    /// A limit sell; panics on malformed input.
    pub fn dummy_sell(id: u64, price: &str, amount: u64) -> Self {
        let price = Dec::parse(price).expect("valid price");
        Self::new_limit(OrderId(id), Direction::Sell, price, Dec::from_u128(u128::from(amount)), id)
            .expect("valid order")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Dec {
        Dec::parse(s).unwrap()
    }

    #[test]
    fn buy_offer_rounds_up() {
        let order = Order::dummy_buy(1, "0.9999", 1000);
        assert_eq!(order.remaining_offer, d("1000"));
        assert_eq!(order.open_amount, d("1000"));
        assert!(!order.matched);
    }

    #[test]
    fn sell_offer_is_base_amount() {
        let order = Order::dummy_sell(2, "1.5", 40);
        assert_eq!(order.remaining_offer, d("40"));
    }

    #[test]
    fn rejects_non_integral_amount() {
        let err = Order::new_limit(OrderId(1), Direction::Buy, d("1"), d("1.5"), 0).unwrap_err();
        assert!(matches!(err, DexError::InvalidInput { .. }));
        let err = Order::new_limit(OrderId(1), Direction::Buy, d("0"), d("1"), 0).unwrap_err();
        assert!(matches!(err, DexError::InvalidInput { .. }));
    }

    #[test]
    fn validate_open_bounds() {
        let mut order = Order::dummy_buy(1, "1", 10);
        assert!(order.validate().is_ok());
        order.open_amount = d("11");
        assert!(order.validate().is_err());
        order.open_amount = d("-1");
        assert!(order.validate().is_err());
    }

    #[test]
    fn market_orders_use_price_limits() {
        let grid = TickGrid::new(3).unwrap();
        let buy = Order::new_market(OrderId(1), Direction::Buy, d("5"), d("1"), d("0.1"), &grid, 0)
            .unwrap();
        assert_eq!(buy.price, d("1.1"));
        assert_eq!(buy.kind, OrderKind::Market);
        let sell = Order::new_market(OrderId(2), Direction::Sell, d("5"), d("1"), d("0.1"), &grid, 1)
            .unwrap();
        assert_eq!(sell.price, d("0.9"));
    }

    #[test]
    fn fill_tracking() {
        let mut order = Order::dummy_sell(3, "2", 10);
        assert!(!order.is_filled());
        order.open_amount = Dec::ZERO;
        assert!(order.is_filled());
        assert_eq!(order.filled_amount().unwrap(), d("10"));
    }

    #[test]
    fn direction_display_and_opposite() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::Sell.opposite(), Direction::Buy);
    }

    #[test]
    fn order_serde_roundtrip() {
        let order = Order::dummy_buy(9, "1.25", 100);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }
}
