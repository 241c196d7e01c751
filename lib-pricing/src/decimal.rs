//! Fixed-point decimal arithmetic for money values.
//!
//! Prices and SOL amounts are signed 128-bit integers scaled by 10^18.
//! Binary floating point is never used to represent a money value; `f64`
//! appears only as an intermediate in curve evaluation and is converted
//! exactly once through [`Decimal::from_f64_lossy`].
//!
//! # Rounding
//!
//! - Conversion from `f64` rounds half-to-even at the 18th fractional digit.
//! - Multiplication truncates toward zero at the 18th fractional digit.
//! - Conversion to lamports truncates toward zero.

use serde::{Deserialize, Serialize};

/// Scale factor: 10^18 fractional digits.
pub const SCALE: i128 = 1_000_000_000_000_000_000;

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Signed fixed-point decimal with 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Decimal(i128);

impl Decimal {
    pub const ZERO: Decimal = Decimal(0);
    pub const ONE: Decimal = Decimal(SCALE);

    /// Build from a raw scaled value (`raw` = value × 10^18).
    pub fn from_scaled(raw: i128) -> Self {
        Decimal(raw)
    }

    /// Raw scaled value.
    pub fn to_scaled(self) -> i128 {
        self.0
    }

    /// Build from a whole number.
    pub fn from_u64(v: u64) -> Self {
        Decimal(v as i128 * SCALE)
    }

    /// Exact conversion from lamports (10^-9 SOL).
    pub fn from_lamports(lamports: u64) -> Self {
        Decimal(lamports as i128 * (SCALE / LAMPORTS_PER_SOL as i128))
    }

    /// Convert to lamports, truncating toward zero. `None` for negative values.
    pub fn to_lamports_floor(self) -> Option<u64> {
        if self.0 < 0 {
            return None;
        }
        let lamports = self.0 / (SCALE / LAMPORTS_PER_SOL as i128);
        u64::try_from(lamports).ok()
    }

    /// Quantize a binary float, rounding half-to-even at the 18th digit.
    ///
    /// This is the single point where curve-math intermediates enter the
    /// money domain. `None` for non-finite input or out-of-range values.
    pub fn from_f64_lossy(v: f64) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }
        let scaled = (v * SCALE as f64).round_ties_even();
        if !scaled.is_finite() || scaled >= i128::MAX as f64 || scaled <= i128::MIN as f64 {
            return None;
        }
        Some(Decimal(scaled as i128))
    }

    /// Lossy conversion for display and formula-variable use only.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Decimal) -> Option<Decimal> {
        self.0.checked_add(other.0).map(Decimal)
    }

    pub fn checked_sub(self, other: Decimal) -> Option<Decimal> {
        self.0.checked_sub(other.0).map(Decimal)
    }

    /// Fixed-point multiply, truncating toward zero.
    ///
    /// Split into three partial terms so the intermediate never needs more
    /// than 128 bits unless the true result overflows:
    /// `a·b/S = (a/S)·b + (a%S)·(b/S) + (a%S)·(b%S)/S`.
    pub fn checked_mul(self, other: Decimal) -> Option<Decimal> {
        let (a, b) = (self.0, other.0);
        let hi = (a / SCALE).checked_mul(b)?;
        let mid = (a % SCALE).checked_mul(b / SCALE)?;
        let lo = (a % SCALE).checked_mul(b % SCALE)? / SCALE;
        hi.checked_add(mid)?.checked_add(lo).map(Decimal)
    }

    /// Multiply by an unscaled integer.
    pub fn checked_mul_int(self, n: u64) -> Option<Decimal> {
        self.0.checked_mul(n as i128).map(Decimal)
    }

    /// Divide by 10^p, truncating toward zero. Exact whenever the raw value
    /// carries at least `p` trailing zeros (base-unit → whole-token
    /// conversion always does, since `p <= 18`).
    pub fn div_pow10(self, p: u32) -> Decimal {
        Decimal(self.0 / 10i128.pow(p))
    }

    /// Divide by an unscaled integer, truncating toward zero.
    pub fn div_int(self, n: u64) -> Decimal {
        Decimal(self.0 / n as i128)
    }

    pub fn max(self, other: Decimal) -> Decimal {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let int = abs / SCALE as u128;
        let frac = abs % SCALE as u128;
        if frac == 0 {
            write!(f, "{}{}", sign, int)
        } else {
            let digits = format!("{:018}", frac);
            write!(f, "{}{}.{}", sign, int, digits.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lamports_round_trip() {
        let one_sol = Decimal::from_lamports(LAMPORTS_PER_SOL);
        assert_eq!(one_sol, Decimal::from_u64(1));
        assert_eq!(one_sol.to_lamports_floor(), Some(LAMPORTS_PER_SOL));

        let micro = Decimal::from_f64_lossy(0.000001).unwrap();
        assert_eq!(micro.to_lamports_floor(), Some(1_000));
    }

    #[test]
    fn test_from_f64_rounds_half_to_even() {
        // 1.5 × 10^-18 rounds up to 2 raw units, 2.5 × 10^-18 rounds down to 2.
        assert_eq!(Decimal::from_f64_lossy(1.5e-18).unwrap().to_scaled(), 2);
        assert_eq!(Decimal::from_f64_lossy(2.5e-18).unwrap().to_scaled(), 2);
        assert_eq!(Decimal::from_f64_lossy(3.5e-18).unwrap().to_scaled(), 4);
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        assert!(Decimal::from_f64_lossy(f64::NAN).is_none());
        assert!(Decimal::from_f64_lossy(f64::INFINITY).is_none());
        // Raw range tops out near 1.7 × 10^20 whole units.
        assert!(Decimal::from_f64_lossy(1e19).is_some());
        assert!(Decimal::from_f64_lossy(1e21).is_none());
    }

    #[test]
    fn test_checked_mul_large_operands() {
        // 10^9 × 10^9 = 10^18: the naive raw product would need 256 bits.
        let a = Decimal::from_u64(1_000_000_000);
        let b = Decimal::from_u64(1_000_000_000);
        let product = a.checked_mul(b).unwrap();
        assert_eq!(product, Decimal::from_scaled(10i128.pow(18) * SCALE));
    }

    #[test]
    fn test_checked_mul_fractional() {
        let price = Decimal::from_f64_lossy(0.000001).unwrap();
        let amount = Decimal::from_u64(3);
        assert_eq!(
            price.checked_mul(amount).unwrap(),
            Decimal::from_f64_lossy(0.000003).unwrap()
        );
    }

    #[test]
    fn test_mul_overflow_detected() {
        let big = Decimal::from_scaled(i128::MAX / 2);
        assert!(big.checked_mul(Decimal::from_u64(3)).is_none());
    }

    #[test]
    fn test_div_pow10_exact_for_base_units() {
        // 1000 base units at 9 decimals = 0.000001 whole tokens.
        let whole = Decimal::from_u64(1_000).div_pow10(9);
        assert_eq!(whole, Decimal::from_f64_lossy(0.000001).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(Decimal::from_u64(5).to_string(), "5");
        assert_eq!(Decimal::from_f64_lossy(0.000001).unwrap().to_string(), "0.000001");
        assert_eq!(
            Decimal::from_f64_lossy(-1.5).unwrap().to_string(),
            "-1.5"
        );
        assert_eq!(Decimal::ZERO.to_string(), "0");
    }
}
