//! Pricing Engine Errors

use thiserror::Error;

use crate::formula::FormulaError;

/// Error during price calculation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Sigmoid curve is not implemented")]
    CurveNotImplemented,

    #[error("Missing required curve parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("Custom formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("Curve arithmetic overflow")]
    Overflow,

    #[error("Amount must be greater than zero")]
    InvalidAmount,
}

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;
