//! Domain error types.

use thiserror::Error;

use crate::coupon::CouponError;

/// Errors raised by domain rules.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A status change that the state machine does not allow.
    #[error("Invalid {entity} transition: cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// A stored or submitted status string did not match any known value.
    #[error("Unknown {kind}: {value}")]
    UnknownStatus { kind: &'static str, value: String },

    /// A money amount could not be parsed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A cart line had a non-positive quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A coupon failed strict validation.
    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),
}
