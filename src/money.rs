//! Money Conversion Module
//!
//! Conversion between the network's integer stroop representation and
//! client-facing lumen amounts.
//!
//! ## Internal Representation
//! - All amounts are stored as `i64` stroops
//! - 1 lumen = 10^7 stroops (the network's fixed 7-decimal precision)
//!
//! ## Usage
//! ```rust
//! use stellar_gateway::money::{parse_lumens, to_lumens};
//!
//! let stroops = parse_lumens("1.5").unwrap();
//! assert_eq!(stroops, 15_000_000);
//! assert_eq!(to_lumens(stroops).to_string(), "1.5000000");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::core_types::Stroops;

/// Decimal places of every amount on the network
pub const LUMEN_DECIMALS: u32 = 7;

/// Money conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Convert stroops to a lumen `Decimal` with the full 7-digit scale
pub fn to_lumens(stroops: Stroops) -> Decimal {
    Decimal::new(stroops, LUMEN_DECIMALS)
}

/// Convert a client lumen amount to stroops
///
/// # Errors
/// * `PrecisionOverflow` - more than 7 fractional digits (no silent truncation)
/// * `InvalidAmount` - zero or negative
/// * `Overflow` - does not fit into `i64` stroops
/// * `InvalidFormat` - not a decimal number
pub fn parse_lumens(amount: &str) -> Result<Stroops, MoneyError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    let decimal =
        Decimal::from_str(amount).map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;
    lumens_to_stroops(decimal)
}

/// Convert a lumen `Decimal` to stroops
pub fn lumens_to_stroops(decimal: Decimal) -> Result<Stroops, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    let normalized = decimal.normalize();
    if normalized.scale() > LUMEN_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: LUMEN_DECIMALS,
        });
    }

    let scaled = normalized
        .checked_mul(Decimal::from(10i64.pow(LUMEN_DECIMALS)))
        .ok_or(MoneyError::Overflow)?;
    scaled.to_i64().ok_or(MoneyError::Overflow)
}
