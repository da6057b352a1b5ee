//! System-wide constants for the tickmatch batch auction.

/// Number of fractional decimal digits carried by every [`Dec`](crate::Dec).
pub const PRECISION: u32 = 36;

/// Bits needed to hold `10^PRECISION`, rounded up.
pub const PRECISION_BITS: usize = 120;

/// Bit length of the integer domain amounts and prices live in.
pub const INTEGER_BITS: usize = 256;

/// Maximum bit length of a decimal's scaled integer.
///
/// Any operation whose result needs more bits fails with `Overflow`.
pub const MAX_BIT_LEN: usize = INTEGER_BITS + PRECISION_BITS;

/// Default number of significant digits kept by the tick grid (beyond the
/// leading one).
pub const DEFAULT_TICK_PRECISION: u32 = 4;

/// Largest supported tick precision. Keeps every tick index inside `u64`.
pub const MAX_TICK_PRECISION: u32 = 15;

/// Default maximum ratio a batch price may deviate from the reference
/// price, as `(mantissa, scale)`: 0.1 (10%).
pub const DEFAULT_MAX_PRICE_LIMIT_RATIO: (i128, u32) = (1, 1);

/// Default fee rate charged on pool withdrawals, as `(mantissa, scale)`.
pub const DEFAULT_WITHDRAW_FEE_RATE: (i128, u32) = (0, 0);

/// Default account that receives each batch's rounding dust.
pub const DEFAULT_DUST_COLLECTOR: &str = "tickmatch:dust-collector";
