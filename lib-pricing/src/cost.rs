//! Total Cost Calculation
//!
//! `total_cost` turns a per-token curve price into the SOL amount a buy
//! costs or a sell returns, applying the sell fee where applicable.

use crate::curve::Curve;
use crate::decimal::Decimal;
use crate::errors::PricingError;

/// Priced quote for a buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Per-token price at the supply the quote was computed against.
    pub price_per_token: Decimal,
    /// Whole-token amount × price, before fees.
    pub gross: Decimal,
    /// Sell fee (zero for buys).
    pub fee: Decimal,
    /// Amount owed: equal to `gross` for buys, `gross − fee` for sells,
    /// floored at zero.
    pub net: Decimal,
}

/// Compute the total SOL cost (buy) or proceeds (sell) for an amount.
///
/// # Arguments
///
/// * `curve` - Pricing curve
/// * `amount_base_units` - Token amount in base units
/// * `decimals` - Token decimals (base units per whole token = 10^decimals)
/// * `current_supply` - Minted supply before this transaction, in base units
/// * `is_sell` - Whether this is a sell (fee applies)
/// * `sell_fee_percentage` - Fee fraction in [0, 1]
pub fn total_cost(
    curve: &Curve,
    amount_base_units: u64,
    decimals: u8,
    current_supply: u64,
    is_sell: bool,
    sell_fee_percentage: Decimal,
) -> Result<Quote, PricingError> {
    if amount_base_units == 0 {
        return Err(PricingError::InvalidAmount);
    }

    let price_per_token = curve.price_per_token(current_supply)?;

    let whole_tokens = Decimal::from_u64(amount_base_units).div_pow10(decimals as u32);
    let gross = whole_tokens
        .checked_mul(price_per_token)
        .ok_or(PricingError::Overflow)?;

    if is_sell {
        let fee = gross
            .checked_mul(sell_fee_percentage)
            .ok_or(PricingError::Overflow)?;
        let net = gross
            .checked_sub(fee)
            .ok_or(PricingError::Overflow)?
            .max(Decimal::ZERO);
        Ok(Quote {
            price_per_token,
            gross,
            fee,
            net,
        })
    } else {
        Ok(Quote {
            price_per_token,
            gross,
            fee: Decimal::ZERO,
            net: gross,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(price: f64) -> Curve {
        Curve::Fixed {
            price: Decimal::from_f64_lossy(price).unwrap(),
        }
    }

    #[test]
    fn test_fixed_cost_is_linear_in_amount() {
        let curve = fixed(0.000001);
        let one = total_cost(&curve, 500, 9, 0, false, Decimal::ZERO).unwrap();
        let two = total_cost(&curve, 1_000, 9, 0, false, Decimal::ZERO).unwrap();
        assert_eq!(one.net.checked_mul_int(2).unwrap(), two.net);
    }

    #[test]
    fn test_one_whole_token_at_fixed_price() {
        // 10^9 base units at 9 decimals = 1 whole token: cost is the price, exactly.
        let curve = fixed(0.000001);
        let quote = total_cost(&curve, 1_000_000_000, 9, 0, false, Decimal::ZERO).unwrap();
        assert_eq!(quote.net, Decimal::from_f64_lossy(0.000001).unwrap());
        assert_eq!(quote.net.to_lamports_floor(), Some(1_000));
    }

    #[test]
    fn test_linear_curve_tiny_amount() {
        // 1000 base units at 9 decimals = 0.000001 whole tokens at 1e-6 SOL
        // per token: cost is 1e-12 SOL.
        let curve = Curve::Linear {
            initial_price: Decimal::from_f64_lossy(1e-6).unwrap(),
            slope: Decimal::from_f64_lossy(1e-8).unwrap(),
        };
        let quote = total_cost(&curve, 1_000, 9, 0, false, Decimal::ZERO).unwrap();
        assert_eq!(quote.price_per_token, Decimal::from_f64_lossy(1e-6).unwrap());
        assert_eq!(quote.net, Decimal::from_f64_lossy(1e-12).unwrap());
    }

    #[test]
    fn test_sell_fee_reduces_net() {
        let curve = fixed(0.01);
        let fee_pct = Decimal::from_f64_lossy(0.05).unwrap();
        let quote = total_cost(&curve, 1_000_000_000, 9, 0, true, fee_pct).unwrap();
        assert!(quote.net < quote.gross);
        assert_eq!(quote.fee, Decimal::from_f64_lossy(0.0005).unwrap());
        assert_eq!(quote.net, Decimal::from_f64_lossy(0.0095).unwrap());
    }

    #[test]
    fn test_sell_zero_fee_net_equals_gross() {
        let curve = fixed(0.01);
        let quote = total_cost(&curve, 1_000_000_000, 9, 0, true, Decimal::ZERO).unwrap();
        assert_eq!(quote.net, quote.gross);
        assert_eq!(quote.fee, Decimal::ZERO);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let curve = fixed(0.01);
        assert_eq!(
            total_cost(&curve, 0, 9, 0, false, Decimal::ZERO).unwrap_err(),
            PricingError::InvalidAmount
        );
    }

    #[test]
    fn test_zero_decimals() {
        let curve = fixed(2.0);
        let quote = total_cost(&curve, 3, 0, 0, false, Decimal::ZERO).unwrap();
        assert_eq!(quote.net, Decimal::from_u64(6));
    }
}
