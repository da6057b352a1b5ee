//! # tickmatch-matchcore
//!
//! **Pure deterministic batch matcher for an order book + AMM exchange.**
//!
//! MatchCore takes a pair's standing orders and pool reserves and clears
//! them at a single price per batch. It has:
//!
//! - **Zero side effects**: book and pools are read, never written, while
//!   matching; [`MatchEngine::apply_outcome`] is a separate step
//! - **Deterministic output**: same input -> same result and `match_root`
//! - **Pools as orders**: every pool is a synthetic order source merged
//!   with the book
//! - **Conserved rounding**: buyers round up, sellers round down, and the
//!   difference is reported as dust

pub mod clearing;
pub mod conservation;
pub mod determinism;
pub mod matcher;
pub mod orderbook;
pub mod settlement;
pub mod source;
pub mod tick_level;
pub mod view;

pub use clearing::{ClearingResult, PriceDirection, find_clearing_price};
pub use conservation::verify_conservation;
pub use determinism::{compute_match_root, verify_match_root};
pub use matcher::MatchEngine;
pub use orderbook::OrderBook;
pub use settlement::{Settlement, settle};
pub use source::{OrderSource, PoolOrderSource, SourceOrder};
pub use tick_level::TickLevel;
pub use view::{OrderView, ViewTick};
