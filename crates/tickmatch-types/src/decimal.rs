//! Exact fixed-point decimal arithmetic.
//!
//! A [`Dec`] is a signed scaled integer: `value = mag × 10^-PRECISION`.
//! Addition and subtraction are exact. Multiplication, division and square
//! root compute at doubled precision and rescale with an explicit
//! [`Rounding`] policy. There is no floating point anywhere: the same inputs
//! produce bit-identical outputs on every node.
//!
//! The scaled integer never needs more than [`MAX_BIT_LEN`] bits; any
//! operation that would exceed it fails with [`DexError::Overflow`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{MAX_BIT_LEN, PRECISION};
use crate::{DexError, Result};

/// Kept apart from the crate's `Result` alias, which the macro expansion
/// would otherwise pick up.
mod wide {
    uint::construct_uint! {
        /// Unsigned 1024-bit integer backing [`Dec`](super::Dec). Wide enough
        /// for the doubled-precision intermediates of multiply and divide.
        pub struct U1024(16);
    }
}

pub use wide::U1024;

/// Largest power of ten that fits in a `U1024`.
const MAX_POW10: usize = 308;

static POW10: LazyLock<Vec<U1024>> = LazyLock::new(|| {
    let ten = U1024::from(10u64);
    let mut table = Vec::with_capacity(MAX_POW10 + 1);
    let mut acc = U1024::one();
    table.push(acc);
    for _ in 0..MAX_POW10 {
        acc = acc * ten;
        table.push(acc);
    }
    table
});

/// `10^exp` as a `U1024`. `exp` must not exceed 308.
pub(crate) fn pow10(exp: u32) -> U1024 {
    POW10[exp as usize]
}

/// Number of decimal digits of `n` (`0` has one digit).
pub(crate) fn digit_count(n: &U1024) -> u32 {
    let count = POW10.partition_point(|p| p <= n);
    u32::try_from(count.max(1)).unwrap_or(u32::MAX)
}

/// `2^bits` for `bits < 1024`.
fn pow2(bits: usize) -> U1024 {
    let mut limbs = [0u64; 16];
    limbs[bits / 64] = 1u64 << (bits % 64);
    U1024(limbs)
}

/// Rounding policy applied when a result is rescaled to `PRECISION` digits.
///
/// Rounding acts on the magnitude: `Truncate` is toward zero and `RoundUp`
/// is away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    Truncate,
    RoundNearestEven,
    RoundUp,
}

/// Divide `n` by `d` and round the quotient with `mode`.
pub(crate) fn round_div(n: U1024, d: U1024, mode: Rounding) -> U1024 {
    let (q, r) = n.div_mod(d);
    if r.is_zero() {
        return q;
    }
    let bump = match mode {
        Rounding::Truncate => false,
        Rounding::RoundUp => true,
        Rounding::RoundNearestEven => match (r + r).cmp(&d) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => q.low_u64() & 1 == 1,
        },
    };
    if bump { q + U1024::one() } else { q }
}

/// An exact decimal with `PRECISION` fractional digits.
///
/// The "unset" state of a decimal is modelled as `Option<Dec>`; a `Dec`
/// itself is always a number. Zero is never negative.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dec {
    negative: bool,
    mag: U1024,
}

impl Dec {
    pub const ZERO: Dec = Dec {
        negative: false,
        mag: U1024([0; 16]),
    };

    /// `1.000…` (`10^36` scaled).
    pub const ONE: Dec = Dec {
        negative: false,
        mag: U1024([
            0xb34b_9f10_0000_0000,
            0x00c0_97ce_7bc9_0715,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        ]),
    };

    // =================================================================
    // Construction
    // =================================================================

    /// Build a decimal from a scaled integer that is already known to fit.
    fn from_parts(negative: bool, mag: U1024, op: &'static str) -> Result<Self> {
        if mag.bits() > MAX_BIT_LEN {
            return Err(DexError::Overflow { op });
        }
        Ok(Self {
            negative: negative && !mag.is_zero(),
            mag,
        })
    }

    /// `mantissa × 10^-scale`, like `rust_decimal::Decimal::new`.
    ///
    /// # Panics
    /// Panics if `scale` exceeds `PRECISION`.
    #[must_use]
    pub fn new(mantissa: i128, scale: u32) -> Self {
        assert!(scale <= PRECISION, "scale {scale} exceeds precision {PRECISION}");
        let mag = U1024::from(mantissa.unsigned_abs()) * pow10(PRECISION - scale);
        Self {
            negative: mantissa < 0,
            mag,
        }
    }

    /// An integral decimal.
    #[must_use]
    pub fn from_int(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }

    /// An integral decimal from an unsigned 128-bit amount.
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self {
            negative: false,
            mag: U1024::from(value) * pow10(PRECISION),
        }
    }

    /// A non-negative decimal from its scaled integer.
    pub(crate) fn from_raw(mag: U1024) -> Result<Self> {
        Self::from_parts(false, mag, "from_raw")
    }

    /// A non-negative decimal from a scaled integer no larger than an
    /// existing decimal's.
    pub(crate) fn from_raw_unchecked(mag: U1024) -> Self {
        debug_assert!(mag.bits() <= MAX_BIT_LEN);
        Self {
            negative: false,
            mag,
        }
    }

    /// The scaled integer of a non-negative decimal.
    pub(crate) fn raw(&self) -> U1024 {
        self.mag
    }

    /// The largest representable decimal.
    #[must_use]
    pub fn max_value() -> Self {
        Self {
            negative: false,
            mag: pow2(MAX_BIT_LEN) - U1024::one(),
        }
    }

    // =================================================================
    // Parsing and formatting
    // =================================================================

    /// Parse the canonical text form: an optional leading `-`, an integer
    /// part and an optional `.` followed by 1..=`PRECISION` digits.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(DexError::invalid("empty decimal string"));
        }
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((int_part, frac_part)) => {
                if frac_part.contains('.') {
                    return Err(DexError::invalid(format!("multiple dots in {s:?}")));
                }
                if frac_part.is_empty() {
                    return Err(DexError::invalid(format!("missing fractional digits in {s:?}")));
                }
                (int_part, frac_part)
            }
            None => (body, ""),
        };
        if int_part.is_empty() {
            return Err(DexError::invalid(format!("missing integer part in {s:?}")));
        }
        if frac_part.len() > PRECISION as usize {
            return Err(DexError::invalid(format!(
                "{s:?} has more than {PRECISION} fractional digits"
            )));
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(DexError::invalid(format!("non-digit character in {s:?}")));
        }

        let mut combined = String::with_capacity(int_part.len() + PRECISION as usize);
        combined.push_str(int_part);
        combined.push_str(frac_part);
        combined.extend(std::iter::repeat_n('0', PRECISION as usize - frac_part.len()));

        let mag = U1024::from_dec_str(&combined)
            .map_err(|_| DexError::invalid(format!("{s:?} is out of range")))?;
        if mag.bits() > MAX_BIT_LEN {
            return Err(DexError::invalid(format!("{s:?} exceeds {MAX_BIT_LEN} bits")));
        }
        Ok(Self {
            negative: negative && !mag.is_zero(),
            mag,
        })
    }

    /// Exactly `PRECISION` fractional digits, a single leading `-` for
    /// negative values, no exponent and no trimming.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        let digits = self.mag.to_string();
        let width = PRECISION as usize + 1;
        let padded = if digits.len() < width {
            format!("{digits:0>width$}")
        } else {
            digits
        };
        let split = padded.len() - PRECISION as usize;
        let sign = if self.negative { "-" } else { "" };
        format!("{sign}{}.{}", &padded[..split], &padded[split..])
    }

    // =================================================================
    // Predicates
    // =================================================================

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.mag.is_zero()
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        !self.negative && !self.mag.is_zero()
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// `true` if the value has no fractional part.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        (self.mag % pow10(PRECISION)).is_zero()
    }

    // =================================================================
    // Exact arithmetic
    // =================================================================

    /// Exact addition.
    pub fn checked_add(self, other: Dec) -> Result<Dec> {
        if self.negative == other.negative {
            let mag = self
                .mag
                .checked_add(other.mag)
                .ok_or(DexError::Overflow { op: "add" })?;
            return Self::from_parts(self.negative, mag, "add");
        }
        match self.mag.cmp(&other.mag) {
            Ordering::Less => Self::from_parts(other.negative, other.mag - self.mag, "add"),
            _ => Self::from_parts(self.negative, self.mag - other.mag, "add"),
        }
    }

    /// Exact subtraction.
    pub fn checked_sub(self, other: Dec) -> Result<Dec> {
        self.checked_add(-other)
    }

    #[must_use]
    pub fn abs(self) -> Dec {
        Dec {
            negative: false,
            mag: self.mag,
        }
    }

    // =================================================================
    // Rounded arithmetic
    // =================================================================

    /// Multiply, rescaling the doubled-precision product with `mode`.
    pub fn mul_round(self, other: Dec, mode: Rounding) -> Result<Dec> {
        let product = self
            .mag
            .checked_mul(other.mag)
            .ok_or(DexError::Overflow { op: "mul" })?;
        let mag = round_div(product, pow10(PRECISION), mode);
        Self::from_parts(self.negative != other.negative, mag, "mul")
    }

    /// Divide. The dividend is scaled by `10^(2·PRECISION)`, divided with
    /// truncation (carrying a nonzero remainder up for `RoundUp`), then the
    /// quotient is rescaled to `PRECISION` digits with `mode`.
    pub fn quo_round(self, other: Dec, mode: Rounding) -> Result<Dec> {
        if other.is_zero() {
            return Err(DexError::DivideByZero);
        }
        let scaled = self
            .mag
            .checked_mul(pow10(2 * PRECISION))
            .ok_or(DexError::Overflow { op: "quo" })?;
        let (mut q, r) = scaled.div_mod(other.mag);
        if mode == Rounding::RoundUp && !r.is_zero() {
            q = q + U1024::one();
        }
        let mag = round_div(q, pow10(PRECISION), mode);
        Self::from_parts(self.negative != other.negative, mag, "quo")
    }

    pub fn mul_truncate(self, other: Dec) -> Result<Dec> {
        self.mul_round(other, Rounding::Truncate)
    }

    pub fn mul_round_up(self, other: Dec) -> Result<Dec> {
        self.mul_round(other, Rounding::RoundUp)
    }

    pub fn quo_truncate(self, other: Dec) -> Result<Dec> {
        self.quo_round(other, Rounding::Truncate)
    }

    pub fn quo_round_up(self, other: Dec) -> Result<Dec> {
        self.quo_round(other, Rounding::RoundUp)
    }

    /// Divide by a small integer, rounding the scaled quotient with `mode`.
    pub fn quo_int(self, divisor: u64, mode: Rounding) -> Result<Dec> {
        if divisor == 0 {
            return Err(DexError::DivideByZero);
        }
        let mag = round_div(self.mag, U1024::from(divisor), mode);
        Self::from_parts(self.negative, mag, "quo_int")
    }

    /// Square root: the smallest representable value whose square does not
    /// undershoot the operand (integer sqrt plus a one-step correction).
    pub fn sqrt(self) -> Result<Dec> {
        if self.negative {
            return Err(DexError::invalid(format!(
                "square root of negative value {self}"
            )));
        }
        let n = self
            .mag
            .checked_mul(pow10(PRECISION))
            .ok_or(DexError::Overflow { op: "sqrt" })?;
        let mut root = n.integer_sqrt();
        if root * root < n {
            root = root + U1024::one();
        }
        Self::from_parts(false, root, "sqrt")
    }

    // =================================================================
    // Integral rounding
    // =================================================================

    /// Drop the fractional part (toward zero).
    #[must_use]
    pub fn truncate(self) -> Dec {
        let unit = pow10(PRECISION);
        let mag = self.mag / unit * unit;
        Dec {
            negative: self.negative && !mag.is_zero(),
            mag,
        }
    }

    /// Smallest integer `>= self`.
    pub fn ceil(self) -> Result<Dec> {
        let truncated = self.truncate();
        if truncated == self || self.negative {
            return Ok(truncated);
        }
        truncated.checked_add(Dec::ONE)
    }

    /// Largest integer `<= self`.
    pub fn floor(self) -> Result<Dec> {
        let truncated = self.truncate();
        if truncated == self || !self.negative {
            return Ok(truncated);
        }
        truncated.checked_sub(Dec::ONE)
    }
}

impl Neg for Dec {
    type Output = Dec;

    fn neg(self) -> Dec {
        Dec {
            negative: !self.negative && !self.mag.is_zero(),
            mag: self.mag,
        }
    }
}

impl Ord for Dec {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.mag.cmp(&other.mag),
            (true, true) => other.mag.cmp(&self.mag),
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
        }
    }
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for Dec {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({})", self.to_canonical_string())
    }
}

impl FromStr for Dec {
    type Err = DexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Dec::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn d(s: &str) -> Dec {
        Dec::parse(s).unwrap()
    }

    #[test]
    fn wide_integer_parses_decimal_text() {
        assert_eq!(U1024::from_dec_str("1000").unwrap(), pow10(3));
    }

    #[test]
    fn one_constant_matches_parse() {
        assert_eq!(Dec::ONE, d("1"));
        assert_eq!(Dec::ONE, Dec::from_int(1));
        assert_eq!(Dec::ZERO, d("0.0"));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for bad in ["", "-", "1.2.3", "1.", ".5", "abc", "1e5", "+1", "1.0000000000000000000000000000000000001"] {
            assert!(
                matches!(Dec::parse(bad), Err(DexError::InvalidInput { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_magnitude_beyond_bit_length() {
        let too_big = format!("1{}", "0".repeat(80));
        assert!(matches!(Dec::parse(&too_big), Err(DexError::InvalidInput { .. })));
    }

    #[test]
    fn canonical_string_has_full_precision() {
        assert_eq!(
            d("1.5").to_canonical_string(),
            "1.500000000000000000000000000000000000"
        );
        assert_eq!(
            d("-0.000000000000000000000000000000000001").to_canonical_string(),
            "-0.000000000000000000000000000000000001"
        );
        assert_eq!(
            Dec::ZERO.to_canonical_string(),
            "0.000000000000000000000000000000000000"
        );
    }

    #[test]
    fn negative_zero_is_zero() {
        let z = d("-0.000");
        assert_eq!(z, Dec::ZERO);
        assert!(!z.is_negative());
        assert_eq!(z.to_canonical_string(), Dec::ZERO.to_canonical_string());
    }

    #[test]
    fn add_and_sub_are_exact() {
        assert_eq!(d("0.1").checked_add(d("0.2")).unwrap(), d("0.3"));
        assert_eq!(d("1").checked_sub(d("2.5")).unwrap(), d("-1.5"));
        assert_eq!(d("-1").checked_add(d("1")).unwrap(), Dec::ZERO);
    }

    #[test]
    fn add_overflow_fails() {
        let max = Dec::max_value();
        assert_eq!(
            max.checked_add(Dec::ONE),
            Err(DexError::Overflow { op: "add" })
        );
    }

    #[test]
    fn mul_rounding_modes() {
        let tiny = d("0.000000000000000000000000000000000001");
        let half = d("0.5");
        // 1e-36 * 0.5 = 5e-37
        assert_eq!(tiny.mul_round(half, Rounding::Truncate).unwrap(), Dec::ZERO);
        assert_eq!(tiny.mul_round(half, Rounding::RoundUp).unwrap(), tiny);
        // half-even: 0.5 ulp rounds to 0 (even)
        assert_eq!(
            tiny.mul_round(half, Rounding::RoundNearestEven).unwrap(),
            Dec::ZERO
        );
        // 3e-36 * 0.5 = 1.5 ulp -> 2 ulp
        let three = d("0.000000000000000000000000000000000003");
        assert_eq!(
            three.mul_round(half, Rounding::RoundNearestEven).unwrap(),
            d("0.000000000000000000000000000000000002")
        );
        assert_eq!(
            d("-1.5").mul_round(d("2"), Rounding::Truncate).unwrap(),
            d("-3")
        );
    }

    #[test]
    fn quo_rounding_modes() {
        let third_trunc = Dec::ONE.quo_truncate(Dec::from_int(3)).unwrap();
        assert_eq!(third_trunc, d("0.333333333333333333333333333333333333"));
        let third_up = Dec::ONE.quo_round_up(Dec::from_int(3)).unwrap();
        assert_eq!(third_up, d("0.333333333333333333333333333333333334"));
        let two_thirds = Dec::from_int(2)
            .quo_round(Dec::from_int(3), Rounding::RoundNearestEven)
            .unwrap();
        assert_eq!(two_thirds, d("0.666666666666666666666666666666666667"));
        assert_eq!(
            d("-1").quo_round_up(Dec::from_int(3)).unwrap(),
            d("-0.333333333333333333333333333333333334")
        );
    }

    #[test]
    fn quo_by_zero_fails() {
        assert_eq!(Dec::ONE.quo_truncate(Dec::ZERO), Err(DexError::DivideByZero));
        assert_eq!(
            Dec::ONE.quo_int(0, Rounding::Truncate),
            Err(DexError::DivideByZero)
        );
    }

    #[test]
    fn mul_overflow_fails() {
        let big = d(&format!("1{}", "0".repeat(60)));
        assert_eq!(big.mul_truncate(big), Err(DexError::Overflow { op: "mul" }));
    }

    #[test]
    fn sqrt_exact_and_corrected() {
        assert_eq!(d("4").sqrt().unwrap(), d("2"));
        assert_eq!(d("0").sqrt().unwrap(), Dec::ZERO);
        let root2 = d("2").sqrt().unwrap();
        assert_eq!(root2, d("1.414213562373095048801688724209698079"));
        // never undershoots
        assert!(root2.mul_round_up(root2).unwrap() >= d("2"));
        assert!(matches!(d("-1").sqrt(), Err(DexError::InvalidInput { .. })));
    }

    #[test]
    fn integral_rounding() {
        assert_eq!(d("999.9").truncate(), d("999"));
        assert_eq!(d("999.9").ceil().unwrap(), d("1000"));
        assert_eq!(d("-2.5").truncate(), d("-2"));
        assert_eq!(d("-2.5").ceil().unwrap(), d("-2"));
        assert_eq!(d("-2.5").floor().unwrap(), d("-3"));
        assert_eq!(d("7").ceil().unwrap(), d("7"));
        assert!(d("12").is_integer());
        assert!(!d("12.000001").is_integer());
    }

    #[test]
    fn ordering_across_signs() {
        let mut values = vec![d("1"), d("-2"), d("0"), d("-0.5"), d("3.25")];
        values.sort();
        assert_eq!(values, vec![d("-2"), d("-0.5"), d("0"), d("1"), d("3.25")]);
    }

    #[test]
    fn new_matches_parse() {
        assert_eq!(Dec::new(9999, 4), d("0.9999"));
        assert_eq!(Dec::new(-15, 1), d("-1.5"));
        assert_eq!(Dec::from_u128(1_000_000), d("1000000"));
    }

    #[test]
    fn digit_count_of_scaled_integers() {
        assert_eq!(digit_count(&U1024::zero()), 1);
        assert_eq!(digit_count(&U1024::from(9u64)), 1);
        assert_eq!(digit_count(&U1024::from(10u64)), 2);
        assert_eq!(digit_count(&Dec::ONE.raw()), 37);
    }

    #[test]
    fn serde_uses_canonical_string() {
        let value = d("-12.5");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"-12.500000000000000000000000000000000000\"");
        let back: Dec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        assert!(serde_json::from_str::<Dec>("\"1..0\"").is_err());
    }

    #[test]
    fn canonical_round_trip_randomized() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let int_digits = rng.gen_range(1..40);
            let frac_digits = rng.gen_range(0..=PRECISION as usize);
            let mut text = String::new();
            if rng.gen_bool(0.3) {
                text.push('-');
            }
            for _ in 0..int_digits {
                text.push(char::from(b'0' + rng.gen_range(0..10u8)));
            }
            if frac_digits > 0 {
                text.push('.');
                for _ in 0..frac_digits {
                    text.push(char::from(b'0' + rng.gen_range(0..10u8)));
                }
            }
            let value = d(&text);
            let canonical = value.to_canonical_string();
            assert_eq!(Dec::parse(&canonical).unwrap(), value, "{text}");
        }
    }

    #[test]
    fn max_value_round_trips() {
        let max = Dec::max_value();
        assert_eq!(Dec::parse(&max.to_canonical_string()).unwrap(), max);
        assert_eq!(
            Dec::parse(&(-max).to_canonical_string()).unwrap(),
            -max
        );
    }
}
