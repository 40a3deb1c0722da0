//! Checkout error types.

use common::{AddressId, OrderId};
use domain::{CouponError, DomainError};
use store::StoreError;
use thiserror::Error;

/// Coarse classification of checkout failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is invalid; retrying will not help.
    Validation,
    /// Contention or an illegal state change.
    Conflict,
    /// The payment gateway could not be reached or refused the request.
    Gateway,
    /// A callback signature did not verify.
    Signature,
    /// The referenced order or payment does not exist.
    NotFound,
    /// Store or collaborator failure.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Gateway => "gateway",
            ErrorKind::Signature => "signature",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line cannot be ordered.
    #[error("Invalid cart line {line} ({variation_id}): {reason}")]
    InvalidCartLine {
        line: usize,
        variation_id: String,
        reason: String,
    },

    /// The shipping address does not exist or belongs to someone else.
    #[error("Address not found: {0}")]
    AddressNotFound(AddressId),

    /// A coupon failed strict validation.
    #[error("{0}")]
    InvalidCoupon(#[from] CouponError),

    /// The payment gateway failed or timed out.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The sequence lock could not be acquired after all retries.
    #[error("Sequence {sequence} exhausted after {attempts} attempts")]
    SequenceExhausted { sequence: String, attempts: u32 },

    /// A gateway callback carried a signature that does not verify.
    #[error("Signature mismatch for gateway order {0}")]
    SignatureMismatch(String),

    /// No payment carries the given gateway order id.
    #[error("Payment not found for gateway order {0}")]
    PaymentNotFound(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// An external collaborator failed.
    #[error("{service} service error: {reason}")]
    Collaborator {
        service: &'static str,
        reason: String,
    },
}

impl CheckoutError {
    /// Builds a collaborator failure.
    pub fn collaborator(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            service,
            reason: reason.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::EmptyCart
            | CheckoutError::InvalidCartLine { .. }
            | CheckoutError::AddressNotFound(_)
            | CheckoutError::InvalidCoupon(_) => ErrorKind::Validation,
            CheckoutError::SequenceExhausted { .. } => ErrorKind::Conflict,
            CheckoutError::GatewayUnavailable(_) => ErrorKind::Gateway,
            CheckoutError::SignatureMismatch(_) => ErrorKind::Signature,
            CheckoutError::PaymentNotFound(_) | CheckoutError::OrderNotFound(_) => {
                ErrorKind::NotFound
            }
            CheckoutError::Domain(DomainError::InvalidTransition { .. }) => ErrorKind::Conflict,
            CheckoutError::Domain(_) => ErrorKind::Validation,
            CheckoutError::Store(StoreError::ConcurrencyConflict(_))
            | CheckoutError::Store(StoreError::LockTimeout { .. }) => ErrorKind::Conflict,
            CheckoutError::Store(StoreError::PaymentNotFound(_)) => ErrorKind::NotFound,
            CheckoutError::Store(_) | CheckoutError::Collaborator { .. } => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::OrderNotFound(order_id) => CheckoutError::OrderNotFound(order_id),
            StoreError::Domain(domain) => CheckoutError::Domain(domain),
            other => CheckoutError::Store(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
