//! ICO Gateway Pricing Engine
//!
//! Deterministic bonding-curve pricing for token sales.
//!
//! # Purpose
//!
//! Given a curve configuration and the minted supply observed at decision
//! time, compute the per-token price and the total SOL cost or proceeds
//! for an amount, with sell fees applied.
//!
//! # Key Types
//!
//! - [`Curve`]: tagged union over curve kinds (fixed, linear,
//!   exponential, sigmoid, custom)
//! - [`Decimal`]: fixed-point money type (18 fractional digits)
//! - [`Formula`]: explicitly-parsed restricted arithmetic for custom
//!   curves
//! - [`Quote`]: priced result of [`total_cost`]
//!
//! # Usage
//!
//! ```
//! use lib_pricing::{total_cost, Curve, Decimal};
//!
//! let curve = Curve::Fixed { price: Decimal::from_f64_lossy(0.000001).unwrap() };
//! let quote = total_cost(&curve, 1_000_000_000, 9, 0, false, Decimal::ZERO).unwrap();
//! assert_eq!(quote.net.to_lamports_floor(), Some(1_000));
//! ```

pub mod cost;
pub mod curve;
pub mod decimal;
pub mod errors;
pub mod formula;

pub use cost::{total_cost, Quote};
pub use curve::Curve;
pub use decimal::{Decimal, LAMPORTS_PER_SOL};
pub use errors::{PricingError, PricingResult};
pub use formula::{Formula, FormulaError, FormulaVars};
