//! # tickmatch-amm
//!
//! Liquidity pools that act as synthetic order sources for the batch
//! auction.
//!
//! A pool never stores orders. Given a tick price it derives analytically
//! how much base asset it would buy (below its price) or sell (above its
//! price) if the batch cleared there, by inverting the constant-product
//! curve at a uniform price.
//!
//! - [`BasicPool`]: `x·y = k` over the real reserves.
//! - [`RangedPool`]: the same curve over virtual reserves, confined to a
//!   `[min_price, max_price]` band.
//! - [`Pool`]: the closed enum the matcher consumes.

pub mod basic;
pub mod math;
pub mod pool;
pub mod ranged;

pub use basic::BasicPool;
pub use math::{DepositOutcome, WithdrawOutcome};
pub use pool::Pool;
pub use ranged::RangedPool;
