//! Gateway Error Taxonomy
//!
//! Every expected outcome of a purchase attempt has a stable error kind
//! and a stable user-safe message. Internal failures (transport faults,
//! malformed ledger responses, bugs) are logged with full context
//! server-side and surfaced as a generic message, never passed through
//! raw.

use thiserror::Error;

use lib_pricing::{Decimal, PricingError};
use lib_registry::{RegistryError, StoreError, ValidationError};

use crate::wire::WireError;

/// Error from the ledger service
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed, wrong-type, or wrong-destination transaction.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Right transaction shape, wrong SOL amount (buy path).
    #[error("Insufficient payment: required {required} SOL, received {received} SOL")]
    InsufficientPayment { required: Decimal, received: Decimal },

    /// Right transaction shape, wrong token amount (sell path).
    #[error("Insufficient token deposit: required {required} base units, received {received}")]
    InsufficientDeposit { required: u64, received: u64 },

    /// Submitted transaction reached a terminal failure on-chain.
    #[error("Transaction failed on-chain: {0}")]
    TransactionFailed(String),

    /// Confirmation polling exhausted its bound without a terminal status.
    #[error("Transaction confirmation timed out")]
    ConfirmationTimeout,

    /// Network or HTTP failure talking to the RPC endpoint.
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// Response arrived but did not have the expected shape.
    #[error("Malformed ledger response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Terminal outcome of a gateway operation
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Rate limit exceeded for client {0}")]
    RateLimitExceeded(String),

    #[error("ICO not found: {0}")]
    NotFound(String),

    #[error("ICO '{ico_id}' is not active (now: {now}, start: {start}, end: {end})")]
    InactiveIco {
        ico_id: String,
        now: u64,
        start: u64,
        end: u64,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Price calculation failed: {0}")]
    PriceCalculation(#[from] PricingError),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Insufficient funds: required {required}, received {received}")]
    InsufficientFunds { required: String, received: String },

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Invalid ICO configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to persist ICO configuration: {0}")]
    Persistence(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable, user-safe message for this error kind.
    ///
    /// Never includes transport detail, stack context, or anything else
    /// from the internal error chain except amounts and identifiers the
    /// caller already supplied or needs to act on.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::RateLimitExceeded(_) => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            GatewayError::NotFound(ico_id) => format!("ICO with id {ico_id} not found."),
            GatewayError::InactiveIco { ico_id, .. } => {
                format!("ICO '{ico_id}' is not active.")
            }
            GatewayError::InvalidInput(_) => {
                "Error processing request: invalid input parameters.".to_string()
            }
            GatewayError::PriceCalculation(err) => match err {
                PricingError::CurveNotImplemented => {
                    "This ICO uses a curve that is not implemented yet.".to_string()
                }
                _ => "Error calculating token price.".to_string(),
            },
            GatewayError::InvalidTransaction(_) => "Invalid payment transaction.".to_string(),
            GatewayError::InsufficientFunds { required, received } => {
                format!("Insufficient payment. Required: {required}. Received: {received}.")
            }
            GatewayError::TransactionFailed(_) => {
                "Token transfer failed. Please resubmit with a new payment.".to_string()
            }
            GatewayError::Validation(err) => format!("Invalid ICO configuration: {err}"),
            GatewayError::Persistence(_) => "Error saving ICO configuration.".to_string(),
            GatewayError::Internal(_) => "An unexpected server error occurred.".to_string(),
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => GatewayError::NotFound(id),
            RegistryError::Validation(e) => GatewayError::Validation(e),
            RegistryError::Persistence(e) => GatewayError::Persistence(e),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Startup-time configuration error. Fatal: the gateway must not run
/// with invalid pricing or wallet configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("{name} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
