//! Bonding curve variants and per-token pricing.
//!
//! `Curve` is a tagged union: adding a curve kind is an exhaustive-match
//! change, not a string comparison with a fallthrough error. Required
//! parameters are part of the variant, so a curve that reaches pricing is
//! already structurally complete.
//!
//! # Overflow policy
//!
//! Exponential and custom curves evaluate in `f64` and quantize once
//! through [`Decimal::from_f64_lossy`]; a non-finite or out-of-range
//! intermediate is reported as [`PricingError::Overflow`], never silently
//! wrapped or saturated. Linear curves use checked fixed-point arithmetic
//! throughout.

use tracing::warn;

use crate::decimal::Decimal;
use crate::errors::PricingError;
use crate::formula::{Formula, FormulaVars};

/// Bonding curve pricing formula.
#[derive(Debug, Clone)]
pub enum Curve {
    /// Constant price regardless of supply.
    Fixed { price: Decimal },
    /// `price = initial_price + slope × minted` (minted in base units).
    /// Slope may be negative; negative prices clamp to zero.
    Linear {
        initial_price: Decimal,
        slope: Decimal,
    },
    /// `price = initial_price × (1 + growth_rate)^minted`.
    Exponential {
        initial_price: Decimal,
        growth_rate: f64,
    },
    /// Reserved. Parameters were never specified upstream; evaluation
    /// always fails with `CurveNotImplemented`.
    Sigmoid,
    /// User-supplied restricted formula over the closed variable set.
    Custom {
        formula: Formula,
        initial_price: Decimal,
        slope: Option<Decimal>,
        growth_rate: Option<f64>,
    },
}

impl Curve {
    /// Display name for the curve kind.
    pub fn name(&self) -> &'static str {
        match self {
            Curve::Fixed { .. } => "fixed",
            Curve::Linear { .. } => "linear",
            Curve::Exponential { .. } => "exponential",
            Curve::Sigmoid => "sigmoid",
            Curve::Custom { .. } => "custom",
        }
    }

    /// Price per whole token at the given minted supply.
    ///
    /// The supply is the state *before* the transaction being priced.
    /// Negative results from pathological parameters clamp to zero with a
    /// warning.
    pub fn price_per_token(&self, minted: u64) -> Result<Decimal, PricingError> {
        let price = match self {
            Curve::Fixed { price } => *price,
            Curve::Linear {
                initial_price,
                slope,
            } => slope
                .checked_mul_int(minted)
                .and_then(|term| initial_price.checked_add(term))
                .ok_or(PricingError::Overflow)?,
            Curve::Exponential {
                initial_price,
                growth_rate,
            } => {
                let factor = (1.0 + growth_rate).powf(minted as f64);
                let value = initial_price.to_f64() * factor;
                if !value.is_finite() {
                    return Err(PricingError::Overflow);
                }
                Decimal::from_f64_lossy(value).ok_or(PricingError::Overflow)?
            }
            Curve::Sigmoid => return Err(PricingError::CurveNotImplemented),
            Curve::Custom {
                formula,
                initial_price,
                slope,
                growth_rate,
            } => {
                let vars = FormulaVars {
                    initial_price: initial_price.to_f64(),
                    total_tokens_minted: minted as f64,
                    slope: slope.map(Decimal::to_f64),
                    growth_rate: *growth_rate,
                };
                let value = formula.eval(&vars)?;
                Decimal::from_f64_lossy(value).ok_or(PricingError::Overflow)?
            }
        };

        if price.is_negative() {
            warn!(
                curve = self.name(),
                minted,
                price = %price,
                "calculated negative price per token, clamping to 0"
            );
            return Ok(Decimal::ZERO);
        }
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ignores_supply() {
        let curve = Curve::Fixed {
            price: Decimal::from_f64_lossy(0.000001).unwrap(),
        };
        assert_eq!(
            curve.price_per_token(0).unwrap(),
            curve.price_per_token(1_000_000).unwrap()
        );
    }

    #[test]
    fn test_linear_price_moves_with_supply() {
        let curve = Curve::Linear {
            initial_price: Decimal::from_f64_lossy(1e-6).unwrap(),
            slope: Decimal::from_f64_lossy(1e-8).unwrap(),
        };

        // At zero supply the price is exactly the initial price.
        assert_eq!(
            curve.price_per_token(0).unwrap(),
            Decimal::from_f64_lossy(1e-6).unwrap()
        );

        // Strictly increasing with positive slope.
        let p1 = curve.price_per_token(100).unwrap();
        let p2 = curve.price_per_token(200).unwrap();
        assert!(p2 > p1);
    }

    #[test]
    fn test_linear_negative_slope_clamps_to_zero() {
        let curve = Curve::Linear {
            initial_price: Decimal::from_f64_lossy(1e-6).unwrap(),
            slope: Decimal::from_f64_lossy(-1e-6).unwrap(),
        };

        let p0 = curve.price_per_token(0).unwrap();
        let p1 = curve.price_per_token(1).unwrap();
        assert!(p1 < p0);
        // Far past the zero crossing the price floors at zero.
        assert_eq!(curve.price_per_token(1_000_000).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_exponential_non_decreasing_and_non_negative() {
        let curve = Curve::Exponential {
            initial_price: Decimal::from_f64_lossy(1e-7).unwrap(),
            growth_rate: 1e-6,
        };

        let mut last = Decimal::ZERO;
        for minted in [0u64, 10, 1_000, 100_000, 10_000_000] {
            let price = curve.price_per_token(minted).unwrap();
            assert!(price >= last);
            last = price;
        }
    }

    #[test]
    fn test_exponential_overflow_is_an_error() {
        let curve = Curve::Exponential {
            initial_price: Decimal::from_u64(1),
            growth_rate: 1.0,
        };
        // 2^u64::MAX is not finite in f64.
        assert_eq!(
            curve.price_per_token(u64::MAX).unwrap_err(),
            PricingError::Overflow
        );
    }

    #[test]
    fn test_sigmoid_not_implemented() {
        assert_eq!(
            Curve::Sigmoid.price_per_token(0).unwrap_err(),
            PricingError::CurveNotImplemented
        );
    }

    #[test]
    fn test_custom_formula_price() {
        let curve = Curve::Custom {
            formula: Formula::parse("initial_price + slope * total_tokens_minted").unwrap(),
            initial_price: Decimal::from_f64_lossy(1e-7).unwrap(),
            slope: Some(Decimal::from_f64_lossy(1e-9).unwrap()),
            growth_rate: None,
        };
        assert_eq!(
            curve.price_per_token(100).unwrap(),
            Decimal::from_f64_lossy(2e-7).unwrap()
        );
    }

    #[test]
    fn test_custom_formula_error_propagates() {
        let curve = Curve::Custom {
            formula: Formula::parse("initial_price / growth_rate").unwrap(),
            initial_price: Decimal::from_u64(1),
            slope: None,
            growth_rate: None,
        };
        assert!(matches!(
            curve.price_per_token(0).unwrap_err(),
            PricingError::Formula(_)
        ));
    }
}
