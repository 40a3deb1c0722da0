use common::{OrderId, PaymentId};
use thiserror::Error;

/// Errors that can occur when interacting with the commerce store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The sequence lock could not be acquired within the bounded wait.
    #[error("Timed out waiting for the lock on sequence {sequence}")]
    LockTimeout { sequence: String },

    /// An aggregate failed the consistency checks before insertion.
    #[error("Invalid aggregate: {0}")]
    InvalidAggregate(String),

    /// A row that had to be unique already exists.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The payment was not found.
    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// A domain rule rejected the change.
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
