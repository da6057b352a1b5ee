//! Conversions between [`Dec`] and `rust_decimal::Decimal`.
//!
//! Ledger layers that keep balances in `rust_decimal` can hand values to
//! the matching core losslessly. The way back rounds to the 28 fractional
//! digits and 96-bit mantissa `rust_decimal` supports.

use rust_decimal::Decimal;

use crate::constants::PRECISION;
use crate::decimal::{pow10, round_div};
use crate::{Dec, DexError, Result, Rounding};

/// Largest scale `rust_decimal` can carry.
const RUST_DECIMAL_MAX_SCALE: u32 = 28;

/// Mantissa width of a `rust_decimal::Decimal`.
const RUST_DECIMAL_MANTISSA_BITS: usize = 96;

impl From<Decimal> for Dec {
    fn from(value: Decimal) -> Self {
        // 96-bit mantissa, scale <= 28: always representable.
        Dec::new(value.mantissa(), value.scale())
    }
}

impl Dec {
    /// Convert to a `rust_decimal::Decimal`, keeping as many fractional
    /// digits as fit and rounding the rest with `mode`.
    pub fn to_rust_decimal(self, mode: Rounding) -> Result<Decimal> {
        let mag = self.abs().raw();
        for scale in (0..=RUST_DECIMAL_MAX_SCALE).rev() {
            let scaled = round_div(mag, pow10(PRECISION - scale), mode);
            if scaled.bits() > RUST_DECIMAL_MANTISSA_BITS {
                continue;
            }
            let magnitude = i128::try_from(scaled.low_u128())
                .map_err(|_| DexError::Overflow { op: "to_rust_decimal" })?;
            let mantissa = if self.is_negative() { -magnitude } else { magnitude };
            return Decimal::try_from_i128_with_scale(mantissa, scale)
                .map_err(|_| DexError::Overflow { op: "to_rust_decimal" });
        }
        Err(DexError::Overflow {
            op: "to_rust_decimal",
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn from_rust_decimal_is_exact() {
        assert_eq!(Dec::from(Decimal::new(12345, 3)), Dec::parse("12.345").unwrap());
        assert_eq!(Dec::from(Decimal::new(-7, 28)), Dec::new(-7, 28));
        assert_eq!(Dec::from(Decimal::MAX), Dec::parse(&Decimal::MAX.to_string()).unwrap());
    }

    #[test]
    fn to_rust_decimal_keeps_short_values() {
        let value = Dec::parse("-0.9999").unwrap();
        let back = value.to_rust_decimal(Rounding::Truncate).unwrap();
        assert_eq!(back, Decimal::new(-9999, 4));
    }

    #[test]
    fn to_rust_decimal_rounds_extra_digits() {
        let third = Dec::ONE.quo_truncate(Dec::from_int(3)).unwrap();
        let down = third.to_rust_decimal(Rounding::Truncate).unwrap();
        let up = third.to_rust_decimal(Rounding::RoundUp).unwrap();
        assert_eq!(down.scale(), 28);
        assert!(up > down);
    }

    #[test]
    fn to_rust_decimal_drops_scale_for_large_values() {
        let big = Dec::parse("1000000000000000000000.5").unwrap();
        let converted = big.to_rust_decimal(Rounding::RoundNearestEven).unwrap();
        assert_eq!(Dec::from(converted), big);
    }

    #[test]
    fn to_rust_decimal_overflows_past_96_bits() {
        let huge = Dec::from_u128(u128::MAX);
        assert!(matches!(
            huge.to_rust_decimal(Rounding::Truncate),
            Err(DexError::Overflow { .. })
        ));
    }
}
