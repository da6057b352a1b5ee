//! A single tick in the order book.
//!
//! A level does not own its orders. It keeps the arena slots of the orders
//! resting at its price, in arrival order (time priority).

use tickmatch_types::{Dec, Direction, Order, Result};

/// All orders of one direction at exactly one tick price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickLevel {
    /// The tick price of this level.
    pub price: Dec,
    /// Levels are direction-pure.
    pub direction: Direction,
    /// Arena slots, front = oldest = highest priority.
    slots: Vec<usize>,
}

impl TickLevel {
    /// Create a new empty level.
    #[must_use]
    pub fn new(price: Dec, direction: Direction) -> Self {
        Self {
            price,
            direction,
            slots: Vec::new(),
        }
    }

    /// Add an order slot to the back of this level (lowest time priority).
    pub fn push_back(&mut self, slot: usize) {
        self.slots.push(slot);
    }

    /// Slots in priority order.
    #[must_use]
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Total open amount across the level's orders.
    pub fn open_amount(&self, arena: &[Order]) -> Result<Dec> {
        self.slots
            .iter()
            .try_fold(Dec::ZERO, |acc, &slot| acc.checked_add(arena[slot].open_amount))
    }

    /// Returns `true` if there are no orders at this level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of orders at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
