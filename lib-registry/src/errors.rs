//! Registry and Validation Errors

use thiserror::Error;

use lib_pricing::PricingError;

/// Specific reason an ICO definition was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("ICO ID must be a non-empty string")]
    EmptyId,

    #[error("ICO ID is too long (max {max} characters)")]
    IdTooLong { max: usize },

    #[error("Token name cannot be empty")]
    EmptyName,

    #[error("Token symbol cannot be empty")]
    EmptySymbol,

    #[error("Token symbol too long (max {max} characters)")]
    SymbolTooLong { max: usize },

    #[error("ICO start time ({start}) must be before end time ({end})")]
    InvalidTimeWindow { start: u64, end: u64 },

    #[error("Token decimals must be between 0 and 18, got {0}")]
    InvalidDecimals(u8),

    #[error("Token total supply must be positive")]
    NonPositiveSupply,

    #[error("Sell fee percentage must be between 0.0 and 1.0, got {0}")]
    InvalidSellFee(f64),

    #[error("Invalid curve configuration: {0}")]
    Curve(#[from] PricingError),
}

/// Error during registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("ICO not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist ICO configuration: {0}")]
    Persistence(#[from] StoreError),

    #[error("Minted counter overflow for ICO {0}")]
    CounterOverflow(String),

    #[error("Cannot decrement minted counter below zero: have {have}, want {want}")]
    InsufficientMinted { have: u64, want: u64 },
}

/// Error during config-store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
