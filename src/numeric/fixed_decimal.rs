// ============================================================================
// Fixed-Point Decimal
// Exact decimal arithmetic for prices and quantities
// ============================================================================

use super::errors::{NumericError, NumericResult};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Fixed-point decimal number with compile-time precision.
///
/// Internally stores `value × 10^DECIMALS` as an i64, so two values at the
/// same precision compare and subtract exactly.
///
/// # Value Range
/// With DECIMALS=8 (default):
/// - Maximum: +92,233,720,368.54775807
/// - Precision: 0.00000001
///
/// # Example
/// ```
/// use order_matching_engine::numeric::Quantity;
///
/// let resting: Quantity = "10".parse().unwrap();
/// let incoming: Quantity = "15".parse().unwrap();
/// let matched = resting.min(incoming);
/// assert_eq!(incoming.checked_sub(matched).unwrap(), "5".parse::<Quantity>().unwrap());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedDecimal<const DECIMALS: u8 = 8>(i64);

/// Compute 10^n at compile time
const fn pow10(n: u8) -> i64 {
    let mut result: i64 = 1;
    let mut i = 0;
    while i < n {
        result *= 10;
        i += 1;
    }
    result
}

impl<const D: u8> FixedDecimal<D> {
    /// The scale factor (10^DECIMALS)
    pub const SCALE: i64 = pow10(D);

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(pow10(D));

    /// Largest representable value
    pub const MAX: Self = Self(i64::MAX);

    // ========================================================================
    // Construction
    // ========================================================================

    /// Create from the raw scaled representation.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Create from a whole number.
    ///
    /// # Errors
    /// Returns `Overflow` if the value is too large to represent.
    #[inline]
    pub fn from_integer(value: i64) -> NumericResult<Self> {
        value
            .checked_mul(Self::SCALE)
            .map(Self)
            .ok_or(NumericError::Overflow)
    }

    /// Raw scaled value (`value × 10^DECIMALS`).
    #[inline]
    pub const fn raw_value(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// Checked addition.
    #[inline]
    pub fn checked_add(self, rhs: Self) -> NumericResult<Self> {
        self.0.checked_add(rhs.0).map(Self).ok_or(if rhs.0 > 0 {
            NumericError::Overflow
        } else {
            NumericError::Underflow
        })
    }

    /// Checked subtraction.
    #[inline]
    pub fn checked_sub(self, rhs: Self) -> NumericResult<Self> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(if rhs.0 < 0 {
            NumericError::Overflow
        } else {
            NumericError::Underflow
        })
    }

    /// Checked multiplication, rounding half away from zero.
    ///
    /// Uses an i128 intermediate so that the product of two in-range values
    /// never wraps before it is scaled back.
    pub fn checked_mul(self, rhs: Self) -> NumericResult<Self> {
        let scale = Self::SCALE as i128;
        let product = (self.0 as i128) * (rhs.0 as i128);
        let half = if product >= 0 { scale / 2 } else { -(scale / 2) };
        let result = (product + half) / scale;

        i64::try_from(result).map(Self).map_err(|_| {
            if result > 0 {
                NumericError::Overflow
            } else {
                NumericError::Underflow
            }
        })
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    // ========================================================================
    // rust_decimal boundary conversions
    // ========================================================================

    /// Convert from `rust_decimal::Decimal`, rejecting values that carry more
    /// decimal places than this type stores.
    ///
    /// # Errors
    /// - `PrecisionLoss` if significant digits would be dropped
    /// - `Overflow` if the value does not fit in the scaled i64
    pub fn from_decimal(d: rust_decimal::Decimal) -> NumericResult<Self> {
        let mut rescaled = d;
        rescaled.rescale(D as u32);
        if rescaled != d {
            return Err(NumericError::PrecisionLoss);
        }

        i64::try_from(rescaled.mantissa())
            .map(Self)
            .map_err(|_| NumericError::Overflow)
    }

    /// Convert to `rust_decimal::Decimal` (exact).
    pub fn to_decimal(self) -> rust_decimal::Decimal {
        rust_decimal::Decimal::new(self.0, D as u32)
    }
}

// ============================================================================
// Display / Debug
// ============================================================================

impl<const D: u8> fmt::Debug for FixedDecimal<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedDecimal<{}>({})", D, self)
    }
}

impl<const D: u8> fmt::Display for FixedDecimal<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;

        if D == 0 {
            write!(f, "{}{}", sign, abs)
        } else {
            write!(
                f,
                "{}{}.{:0>width$}",
                sign,
                abs / scale,
                abs % scale,
                width = D as usize
            )
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

impl<const D: u8> FromStr for FixedDecimal<D> {
    type Err = NumericError;

    /// Parse a plain decimal string such as `"100"`, `"0.5"` or `"-2.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_str, frac_str) = match digits.split_once('.') {
            Some((int_str, frac_str)) => (int_str, frac_str),
            None => (digits, ""),
        };

        if int_str.is_empty() && frac_str.is_empty() {
            return Err(NumericError::InvalidInput);
        }
        if !int_str.bytes().chain(frac_str.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(NumericError::InvalidInput);
        }
        if frac_str.len() > D as usize {
            return Err(NumericError::PrecisionLoss);
        }

        let int_val: i64 = if int_str.is_empty() {
            0
        } else {
            int_str.parse().map_err(|_| NumericError::Overflow)?
        };
        let frac_val: i64 = if frac_str.is_empty() {
            0
        } else {
            format!("{:0<width$}", frac_str, width = D as usize)
                .parse()
                .map_err(|_| NumericError::InvalidInput)?
        };

        let magnitude = int_val
            .checked_mul(Self::SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or(NumericError::Overflow)?;

        Ok(Self(if negative { -magnitude } else { magnitude }))
    }
}

impl<const D: u8> Sum for FixedDecimal<D> {
    /// Saturating sum, for display aggregates only; matching uses checked ops.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0i64, |acc, v| acc.saturating_add(v.0)))
    }
}

// ============================================================================
// Serde (decimal strings, so no precision is lost in JSON)
// ============================================================================

#[cfg(feature = "serde")]
impl<const D: u8> serde::Serialize for FixedDecimal<D> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de, const D: u8> serde::Deserialize<'de> for FixedDecimal<D> {
    fn deserialize<De: serde::Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// Price with 8 decimal places
pub type Price = FixedDecimal<8>;

/// Quantity with 8 decimal places
pub type Quantity = FixedDecimal<8>;

#[cfg(test)]
mod tests {
    use super::*;

    type FD8 = FixedDecimal<8>;

    #[test]
    fn test_constants() {
        assert_eq!(FD8::SCALE, 100_000_000);
        assert_eq!(FD8::ONE.raw_value(), 100_000_000);
        assert!(FD8::ZERO.is_zero());
    }

    #[test]
    fn test_parse_and_display() {
        let x: FD8 = "123.45".parse().unwrap();
        assert_eq!(x.raw_value(), 12_345_000_000);
        assert_eq!(x.to_string(), "123.45000000");

        let y: FD8 = ".5".parse().unwrap();
        assert_eq!(y.to_string(), "0.50000000");

        let neg: FD8 = "-0.1".parse().unwrap();
        assert_eq!(neg.to_string(), "-0.10000000");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("abc".parse::<FD8>(), Err(NumericError::InvalidInput));
        assert_eq!("".parse::<FD8>(), Err(NumericError::InvalidInput));
        assert_eq!("1.2.3".parse::<FD8>(), Err(NumericError::InvalidInput));
        assert_eq!("1e5".parse::<FD8>(), Err(NumericError::InvalidInput));
        assert_eq!(
            "0.123456789".parse::<FD8>(),
            Err(NumericError::PrecisionLoss)
        );
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = FD8::from_integer(15).unwrap();
        let b = FD8::from_integer(10).unwrap();
        assert_eq!(a.checked_sub(b).unwrap(), FD8::from_integer(5).unwrap());
        assert_eq!(a.checked_add(b).unwrap(), FD8::from_integer(25).unwrap());
        assert_eq!(FD8::MAX.checked_add(FD8::ONE), Err(NumericError::Overflow));
        assert_eq!(
            FD8::from_raw(i64::MIN).checked_sub(FD8::ONE),
            Err(NumericError::Underflow)
        );
    }

    #[test]
    fn test_checked_mul_rounds() {
        let price: FD8 = "100.5".parse().unwrap();
        let qty: FD8 = "2".parse().unwrap();
        assert_eq!(price.checked_mul(qty).unwrap(), "201".parse().unwrap());

        let tiny = FD8::from_raw(5);
        let half: FD8 = "0.5".parse().unwrap();
        // 0.00000005 * 0.5 = 0.000000025 -> rounds to 0.00000003
        assert_eq!(tiny.checked_mul(half).unwrap().raw_value(), 3);
    }

    #[test]
    fn test_min_max_ordering() {
        let a: FD8 = "10".parse().unwrap();
        let b: FD8 = "9.99999999".parse().unwrap();
        assert!(a > b);
        assert_eq!(a.min(b), b);
        assert_eq!(a.max(b), a);
    }

    #[test]
    fn test_decimal_conversion() {
        use rust_decimal::Decimal;

        let d = Decimal::new(12345, 2); // 123.45
        let x = FD8::from_decimal(d).unwrap();
        assert_eq!(x, "123.45".parse().unwrap());
        assert_eq!(x.to_decimal(), d);

        let too_precise = Decimal::new(1, 9);
        assert_eq!(FD8::from_decimal(too_precise), Err(NumericError::PrecisionLoss));
    }

    #[test]
    fn test_sum() {
        let total: FD8 = ["1.5", "2.25", "0.25"]
            .iter()
            .map(|s| s.parse::<FD8>().unwrap())
            .sum();
        assert_eq!(total, FD8::from_integer(4).unwrap());
    }
}
