//! Shared types for the commerce checkout system.

pub mod types;

pub use types::{
    AddressId, CouponId, InvoiceId, OrderId, OrderItemId, PaymentId, PaymentLogId, ShipmentId, UserId,
};
