//! ICO Configuration Schema
//!
//! Wire-compatible with the gateway's JSON config documents: a top-level
//! `token` object (metadata) and an `ico` object (timing, curve, fees).
//! Curve parameters are flat optional fields on the `ico` object; which
//! ones are required depends on `curve_type`, and absence of a required
//! field is a validation error, never a runtime default.

use serde::{Deserialize, Serialize};

use lib_pricing::{Curve, Decimal, Formula, PricingError};

use crate::errors::ValidationError;

/// Maximum accepted ICO ID length.
pub const MAX_ICO_ID_LENGTH: usize = 100;

/// Maximum accepted token symbol length.
pub const MAX_SYMBOL_LENGTH: usize = 10;

/// Token metadata. Immutable once an ICO is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Total supply in base units
    pub total_supply: u64,
    /// Token decimals (base units per whole token = 10^decimals)
    pub decimals: u8,
    /// On-chain mint address; the gateway default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
}

/// Supported bonding curve kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Fixed,
    Linear,
    Exponential,
    Sigmoid,
    Custom,
}

/// ICO sale parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcoParams {
    /// Unique ICO identifier (matches the config document file stem)
    pub ico_id: String,
    /// Sale opens (Unix seconds)
    pub start_time: u64,
    /// Sale closes (Unix seconds)
    pub end_time: u64,
    /// Pricing curve kind
    pub curve_type: CurveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_formula: Option<String>,
    /// Fee fraction applied to sell proceeds, in [0, 1]
    #[serde(default)]
    pub sell_fee_percentage: f64,
}

/// A complete ICO definition: token metadata plus sale parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcoRecord {
    pub token: TokenDescriptor,
    pub ico: IcoParams,
}

impl IcoRecord {
    /// ICO identifier.
    pub fn id(&self) -> &str {
        &self.ico.ico_id
    }

    /// Whether `now` falls inside the sale window.
    pub fn is_active_at(&self, now: u64) -> bool {
        self.ico.start_time <= now && now <= self.ico.end_time
    }

    /// Validate the definition before it may enter the registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ico.ico_id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.ico.ico_id.len() > MAX_ICO_ID_LENGTH {
            return Err(ValidationError::IdTooLong {
                max: MAX_ICO_ID_LENGTH,
            });
        }
        if self.token.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.token.symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if self.token.symbol.len() > MAX_SYMBOL_LENGTH {
            return Err(ValidationError::SymbolTooLong {
                max: MAX_SYMBOL_LENGTH,
            });
        }
        if self.ico.start_time >= self.ico.end_time {
            return Err(ValidationError::InvalidTimeWindow {
                start: self.ico.start_time,
                end: self.ico.end_time,
            });
        }
        if self.token.decimals > 18 {
            return Err(ValidationError::InvalidDecimals(self.token.decimals));
        }
        if self.token.total_supply == 0 {
            return Err(ValidationError::NonPositiveSupply);
        }
        if !(0.0..=1.0).contains(&self.ico.sell_fee_percentage) {
            return Err(ValidationError::InvalidSellFee(
                self.ico.sell_fee_percentage,
            ));
        }
        // Curve-kind-specific required fields, including formula parsing.
        self.curve()?;
        Ok(())
    }

    /// Build the validated pricing curve for this record.
    pub fn curve(&self) -> Result<Curve, PricingError> {
        let params = &self.ico;
        match params.curve_type {
            CurveKind::Fixed => Ok(Curve::Fixed {
                price: require_price(params.fixed_price, "fixed_price")?,
            }),
            CurveKind::Linear => Ok(Curve::Linear {
                initial_price: require_price(params.initial_price, "initial_price")?,
                slope: require_price(params.slope, "slope")?,
            }),
            CurveKind::Exponential => Ok(Curve::Exponential {
                initial_price: require_price(params.initial_price, "initial_price")?,
                growth_rate: params
                    .growth_rate
                    .ok_or(PricingError::MissingParameter("growth_rate"))?,
            }),
            CurveKind::Sigmoid => Ok(Curve::Sigmoid),
            CurveKind::Custom => {
                let source = params
                    .custom_formula
                    .as_deref()
                    .ok_or(PricingError::MissingParameter("custom_formula"))?;
                Ok(Curve::Custom {
                    formula: Formula::parse(source)?,
                    initial_price: require_price(params.initial_price, "initial_price")?,
                    slope: params
                        .slope
                        .map(|v| decimal_param(v, "slope"))
                        .transpose()?,
                    growth_rate: params.growth_rate,
                })
            }
        }
    }

    /// Sell fee as a decimal fraction.
    pub fn sell_fee(&self) -> Decimal {
        Decimal::from_f64_lossy(self.ico.sell_fee_percentage).unwrap_or(Decimal::ZERO)
    }
}

fn require_price(value: Option<f64>, name: &'static str) -> Result<Decimal, PricingError> {
    let v = value.ok_or(PricingError::MissingParameter(name))?;
    decimal_param(v, name)
}

fn decimal_param(value: f64, name: &'static str) -> Result<Decimal, PricingError> {
    Decimal::from_f64_lossy(value).ok_or(PricingError::MissingParameter(name))
}
