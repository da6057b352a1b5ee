//! Deterministic price-tick quantization.
//!
//! Between consecutive powers of ten the grid has `9 · 10^prec` equal steps,
//! so a tick keeps `prec + 1` significant digits. The step size is derived
//! from the "characteristic" of the price's scaled integer (its decimal digit
//! count minus one):
//!
//! ```text
//! step(price) = 10^(characteristic(price) - prec)   (in scaled units)
//! ```
//!
//! Every tick has a unique non-negative index. The index space is split into
//! bands of width `9 · 10^prec`, one per order of magnitude, starting at the
//! lowest tick (index 0).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TICK_PRECISION, MAX_TICK_PRECISION};
use crate::decimal::{U1024, digit_count, pow10};
use crate::{Dec, DexError, Result};

/// Index of a tick on a [`TickGrid`].
pub type TickIndex = u64;

/// The tick grid for one tick precision.
///
/// Holds the precomputed upper bound so stepping and index lookups never
/// wrap past the representable range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TickGrid {
    prec: u32,
    highest: Dec,
    highest_index: TickIndex,
}

impl TickGrid {
    /// Build the grid for `prec` significant digits (beyond the leading one).
    pub fn new(prec: u32) -> Result<Self> {
        if prec > MAX_TICK_PRECISION {
            return Err(DexError::Configuration(format!(
                "tick precision {prec} exceeds maximum {MAX_TICK_PRECISION}"
            )));
        }
        Ok(Self::build(prec))
    }

    fn build(prec: u32) -> Self {
        let mut grid = Self {
            prec,
            highest: Dec::ZERO,
            highest_index: 0,
        };
        grid.highest = grid.floor_to_grid(Dec::max_value());
        grid.highest_index = grid.index_of_aligned(&grid.highest);
        grid
    }

    #[must_use]
    pub fn precision(&self) -> u32 {
        self.prec
    }

    // =================================================================
    // Bounds
    // =================================================================

    /// The smallest tick: one scaled unit times `10^prec`.
    #[must_use]
    pub fn lowest_tick(&self) -> Dec {
        Dec::from_raw_unchecked(pow10(self.prec))
    }

    /// The largest tick that still fits the decimal bit bound.
    #[must_use]
    pub fn highest_tick(&self) -> Dec {
        self.highest
    }

    #[must_use]
    pub fn highest_index(&self) -> TickIndex {
        self.highest_index
    }

    // =================================================================
    // Quantization
    // =================================================================

    /// The greatest tick `<= price`.
    pub fn price_to_down_tick(&self, price: Dec) -> Result<Dec> {
        self.check_price(price)?;
        Ok(self.floor_to_grid(price))
    }

    /// The smallest tick `>= price`.
    pub fn price_to_up_tick(&self, price: Dec) -> Result<Dec> {
        let tick = self.price_to_down_tick(price)?;
        if tick == price {
            return Ok(tick);
        }
        self.up_tick(tick)
    }

    /// `true` if `price` lies exactly on the grid.
    #[must_use]
    pub fn is_tick(&self, price: Dec) -> bool {
        self.check_price(price).is_ok() && self.floor_to_grid(price) == price
    }

    /// The tick one step above `tick`.
    pub fn up_tick(&self, tick: Dec) -> Result<Dec> {
        self.check_aligned(tick)?;
        if tick >= self.highest {
            return Err(DexError::TickOutOfRange {
                reason: format!("no tick above {tick}"),
            });
        }
        let step = pow10(characteristic(&tick) - self.prec);
        Dec::from_raw(tick.raw() + step)
    }

    /// The tick one step below `tick`. Just below a power of ten the step is
    /// one order of magnitude smaller than just above it.
    pub fn down_tick(&self, tick: Dec) -> Result<Dec> {
        self.check_aligned(tick)?;
        if tick <= self.lowest_tick() {
            return Err(DexError::TickOutOfRange {
                reason: format!("no tick below {tick}"),
            });
        }
        let raw = tick.raw();
        let l = characteristic(&tick);
        let step = if raw == pow10(l) {
            pow10(l - self.prec - 1)
        } else {
            pow10(l - self.prec)
        };
        Dec::from_raw(raw - step)
    }

    /// Quantize to the nearest tick. Exact midpoints go to the tick with the
    /// even index.
    pub fn round_price(&self, price: Dec) -> Result<Dec> {
        let down = self.price_to_down_tick(price)?;
        if down == price || down == self.highest {
            return Ok(down);
        }
        let up = self.up_tick(down)?;
        let below = price.checked_sub(down)?;
        let above = up.checked_sub(price)?;
        match below.cmp(&above) {
            Ordering::Less => Ok(down),
            Ordering::Greater => Ok(up),
            Ordering::Equal => {
                if self.tick_to_index(down)? % 2 == 0 {
                    Ok(down)
                } else {
                    Ok(up)
                }
            }
        }
    }

    // =================================================================
    // Indexing
    // =================================================================

    /// Map a tick to its index. Strictly increasing in `tick`.
    pub fn tick_to_index(&self, tick: Dec) -> Result<TickIndex> {
        self.check_aligned(tick)?;
        Ok(self.index_of_aligned(&tick))
    }

    /// Inverse of [`tick_to_index`](Self::tick_to_index).
    pub fn index_to_tick(&self, index: TickIndex) -> Result<Dec> {
        if index > self.highest_index {
            return Err(DexError::TickOutOfRange {
                reason: format!("index {index} above highest index {}", self.highest_index),
            });
        }
        let band = self.band_width();
        let magnitude = u32::try_from(index / band)
            .map_err(|_| DexError::invariant("tick band does not fit u32"))?;
        let mantissa = index % band + 10u64.pow(self.prec);
        Dec::from_raw(U1024::from(mantissa) * pow10(magnitude))
    }

    // =================================================================
    // Price limits
    // =================================================================

    /// The tick range `[up(last·(1−ratio)), down(last·(1+ratio))]` allowed
    /// around a reference price.
    pub fn price_limits(&self, last_price: Dec, ratio: Dec) -> Result<(Dec, Dec)> {
        if ratio.is_negative() || ratio >= Dec::ONE {
            return Err(DexError::invalid(format!(
                "price limit ratio {ratio} must be in [0, 1)"
            )));
        }
        let lower = last_price.mul_truncate(Dec::ONE.checked_sub(ratio)?)?;
        let upper = last_price.mul_truncate(Dec::ONE.checked_add(ratio)?)?;
        let lower = if lower < self.lowest_tick() {
            self.lowest_tick()
        } else {
            self.price_to_up_tick(lower)?
        };
        let upper = if upper > self.highest {
            self.highest
        } else {
            self.price_to_down_tick(upper)?
        };
        Ok((lower, upper))
    }

    // =================================================================
    // Internals
    // =================================================================

    fn band_width(&self) -> u64 {
        9 * 10u64.pow(self.prec)
    }

    fn check_price(&self, price: Dec) -> Result<()> {
        if !price.is_positive() {
            return Err(DexError::invalid(format!("price {price} must be positive")));
        }
        if price < self.lowest_tick() {
            return Err(DexError::invalid(format!(
                "price {price} is below the lowest tick {}",
                self.lowest_tick()
            )));
        }
        Ok(())
    }

    fn check_aligned(&self, tick: Dec) -> Result<()> {
        self.check_price(tick)?;
        if self.floor_to_grid(tick) != tick {
            return Err(DexError::invalid(format!(
                "price {tick} is not on the tick grid (precision {})",
                self.prec
            )));
        }
        Ok(())
    }

    /// Floor a price that is at least the lowest tick onto the grid.
    fn floor_to_grid(&self, price: Dec) -> Dec {
        let l = characteristic(&price);
        if l <= self.prec {
            return price;
        }
        let step = pow10(l - self.prec);
        Dec::from_raw_unchecked(price.raw() / step * step)
    }

    fn index_of_aligned(&self, tick: &Dec) -> TickIndex {
        let magnitude = characteristic(tick) - self.prec;
        let mantissa = (tick.raw() / pow10(magnitude)).low_u64();
        u64::from(magnitude) * self.band_width() + (mantissa - 10u64.pow(self.prec))
    }
}

impl Default for TickGrid {
    fn default() -> Self {
        Self::build(DEFAULT_TICK_PRECISION)
    }
}

impl TryFrom<u32> for TickGrid {
    type Error = DexError;

    fn try_from(prec: u32) -> Result<Self> {
        Self::new(prec)
    }
}

impl From<TickGrid> for u32 {
    fn from(grid: TickGrid) -> u32 {
        grid.prec
    }
}

/// Decimal digit count of the scaled integer, minus one.
fn characteristic(price: &Dec) -> u32 {
    digit_count(&price.raw()) - 1
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn d(s: &str) -> Dec {
        Dec::parse(s).unwrap()
    }

    fn grid(prec: u32) -> TickGrid {
        TickGrid::new(prec).unwrap()
    }

    #[test]
    fn down_and_up_tick_of_price() {
        let g = grid(3);
        assert_eq!(g.price_to_down_tick(d("1.23456")).unwrap(), d("1.234"));
        assert_eq!(g.price_to_up_tick(d("1.23456")).unwrap(), d("1.235"));
        assert_eq!(g.price_to_up_tick(d("1.234")).unwrap(), d("1.234"));
        assert_eq!(g.price_to_down_tick(d("0.0123456")).unwrap(), d("0.01234"));
        assert_eq!(g.price_to_down_tick(d("98765")).unwrap(), d("98760"));
    }

    #[test]
    fn down_tick_across_power_of_ten() {
        let g = grid(3);
        assert_eq!(g.down_tick(d("1")).unwrap(), d("0.9999"));
        assert_eq!(g.up_tick(d("0.9999")).unwrap(), d("1"));
        assert_eq!(g.down_tick(d("10")).unwrap(), d("9.999"));
        assert_eq!(g.up_tick(d("9.999")).unwrap(), d("10"));
        assert_eq!(g.down_tick(d("1.001")).unwrap(), d("1"));
    }

    #[test]
    fn non_positive_price_is_invalid() {
        let g = grid(3);
        assert!(matches!(g.price_to_down_tick(Dec::ZERO), Err(DexError::InvalidInput { .. })));
        assert!(matches!(g.price_to_down_tick(d("-1")), Err(DexError::InvalidInput { .. })));
        assert!(matches!(g.round_price(Dec::ZERO), Err(DexError::InvalidInput { .. })));
    }

    #[test]
    fn stepping_requires_aligned_ticks() {
        let g = grid(3);
        assert!(matches!(g.up_tick(d("1.0001")), Err(DexError::InvalidInput { .. })));
        assert!(matches!(g.tick_to_index(d("1.0001")), Err(DexError::InvalidInput { .. })));
        assert!(g.is_tick(d("1.001")));
        assert!(!g.is_tick(d("1.0001")));
    }

    #[test]
    fn grid_bounds_do_not_wrap() {
        let g = grid(4);
        let highest = g.highest_tick();
        assert!(matches!(g.up_tick(highest), Err(DexError::TickOutOfRange { .. })));
        assert!(matches!(
            g.down_tick(g.lowest_tick()),
            Err(DexError::TickOutOfRange { .. })
        ));
        assert_eq!(g.index_to_tick(g.highest_index()).unwrap(), highest);
        assert!(matches!(
            g.index_to_tick(g.highest_index() + 1),
            Err(DexError::TickOutOfRange { .. })
        ));
        assert_eq!(g.tick_to_index(g.lowest_tick()).unwrap(), 0);
        assert!(g.down_tick(highest).is_ok());
    }

    #[test]
    fn index_values() {
        let g = grid(3);
        assert_eq!(g.tick_to_index(d("1")).unwrap(), 297_000);
        assert_eq!(g.tick_to_index(d("0.9999")).unwrap(), 296_999);
        assert_eq!(g.index_to_tick(297_001).unwrap(), d("1.001"));
    }

    #[test]
    fn round_price_half_even_on_index() {
        let g = grid(3);
        // 1.000 has an even index, 1.001 odd
        assert_eq!(g.round_price(d("1.0005")).unwrap(), d("1"));
        assert_eq!(g.round_price(d("1.0015")).unwrap(), d("1.002"));
        assert_eq!(g.round_price(d("1.0004")).unwrap(), d("1"));
        assert_eq!(g.round_price(d("1.0006")).unwrap(), d("1.001"));
        assert_eq!(g.round_price(d("1.002")).unwrap(), d("1.002"));
        // below a power of ten the finer step applies
        assert_eq!(g.round_price(d("0.99996")).unwrap(), d("1"));
    }

    #[test]
    fn price_limits_snap_inward() {
        let g = grid(3);
        let (lower, upper) = g.price_limits(d("1"), d("0.1")).unwrap();
        assert_eq!(lower, d("0.9"));
        assert_eq!(upper, d("1.1"));
        let (lower, upper) = g.price_limits(d("1.2345"), d("0.1")).unwrap();
        assert_eq!(lower, d("1.112"));
        assert_eq!(upper, d("1.357"));
        assert!(g.price_limits(d("1"), d("1")).is_err());
    }

    #[test]
    fn down_tick_is_idempotent_randomized() {
        let mut rng = StdRng::seed_from_u64(7);
        for prec in [0, 2, 4, 6] {
            let g = grid(prec);
            for _ in 0..200 {
                let price = Dec::new(i128::from(rng.gen_range(1u64..u64::MAX)), rng.gen_range(0..=20));
                let tick = g.price_to_down_tick(price).unwrap();
                assert!(tick <= price);
                assert_eq!(g.price_to_down_tick(tick).unwrap(), tick);
                let up = g.price_to_up_tick(price).unwrap();
                assert!(up >= price);
                assert!(g.is_tick(up));
            }
        }
    }

    #[test]
    fn index_bijection_randomized() {
        let mut rng = StdRng::seed_from_u64(11);
        for prec in [1, 3, 4] {
            let g = grid(prec);
            for _ in 0..300 {
                let index = rng.gen_range(0..g.highest_index());
                let tick = g.index_to_tick(index).unwrap();
                assert_eq!(g.tick_to_index(tick).unwrap(), index);
                let next = g.up_tick(tick).unwrap();
                assert_eq!(g.tick_to_index(next).unwrap(), index + 1);
                if index > 0 {
                    let prev = g.down_tick(tick).unwrap();
                    assert_eq!(g.tick_to_index(prev).unwrap(), index - 1);
                }
            }
        }
    }

    #[test]
    fn precision_bound_enforced() {
        assert!(matches!(TickGrid::new(16), Err(DexError::Configuration(_))));
        assert_eq!(TickGrid::default().precision(), DEFAULT_TICK_PRECISION);
    }

    #[test]
    fn serde_as_precision() {
        let json = serde_json::to_string(&grid(3)).unwrap();
        assert_eq!(json, "3");
        let back: TickGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid(3));
        assert!(serde_json::from_str::<TickGrid>("99").is_err());
    }
}
