//! # tickmatch-types
//!
//! Exact arithmetic, price quantization, errors and shared models for the
//! **Tickmatch** batch auction.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Decimal**: [`Dec`], [`Rounding`] (36 fractional digits, no floating point)
//! - **Tick grid**: [`TickGrid`], [`TickIndex`]
//! - **Identifiers**: [`OrderId`], [`PoolId`], [`BatchId`], [`OrderRef`]
//! - **Order model**: [`Order`], [`Direction`], [`OrderKind`]
//! - **Fill model**: [`Fill`], [`ExcludedOrder`], [`ExclusionReason`], [`PoolDelta`]
//! - **Batch model**: [`BatchContext`], [`MatchResult`], [`MatchOutcome`]
//! - **Configuration**: [`MatchConfig`]
//! - **Errors**: [`DexError`] with `DEX_ERR_` prefix codes
//! - **Constants**: precision and defaults

pub mod batch;
pub mod config;
pub mod constants;
pub mod decimal;
pub mod error;
pub mod fill;
pub mod ids;
pub mod interop;
pub mod order;
pub mod tick;

// Re-export all primary types at crate root for ergonomic imports:
//   use tickmatch_types::{Dec, TickGrid, Order, Direction, ...};

pub use batch::*;
pub use config::*;
pub use decimal::{Dec, Rounding, U1024};
pub use error::*;
pub use fill::*;
pub use ids::*;
pub use order::*;
pub use tick::*;

// Constants are accessed via `tickmatch_types::constants::FOO`
// (not re-exported to avoid name collisions).
