//! Domain layer for order placement and payment reconciliation.
//!
//! This crate holds the pure business rules:
//! - Money arithmetic and cart pricing
//! - Payment, delivery and shipping state machines
//! - The order aggregate and its conditional payment transitions
//! - Coupon validation and day-bucketed sequence counters

pub mod cart;
pub mod coupon;
pub mod error;
pub mod invoice;
pub mod money;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod sequence;
pub mod shipment;
pub mod status;

pub use cart::{CartLine, ProductId, VariationId};
pub use coupon::{Coupon, CouponError, CouponStatus};
pub use error::DomainError;
pub use invoice::Invoice;
pub use money::{MONEY_SCALE, Money};
pub use order::{FulfillmentUpdate, Order, OrderAggregate, OrderDraft, OrderItem};
pub use payment::{Payment, PaymentLog, PaymentTransition, TransitionOutcome};
pub use pricing::{PriceBreakdown, PricedLine, PricingPolicy};
pub use sequence::{
    INVOICE_NUMBER_BASE, INVOICE_SEQUENCE, ORDER_SEQUENCE, SequenceCounter, SequenceValue,
    invoice_bucket, order_bucket,
};
pub use shipment::{DEFAULT_SHIPPING_TYPE, Shipment};
pub use status::{DeliveryStatus, PaymentLogStatus, PaymentStatus, PaymentType, ShippingStatus};
