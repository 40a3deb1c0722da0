//! Closed status types and their state machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Status of a payment.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──┬──► Success
///    │                     ├──► Failed
///    │                     └──► Cancelled
///    └──────────────────────► (any terminal state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created with the order, awaiting the customer.
    #[default]
    Pending,

    /// Left unpaid past the soft timeout; still payable.
    Processing,

    /// Confirmed by a verified gateway callback (terminal state).
    Success,

    /// Timed out or rejected (terminal state).
    Failed,

    /// Cancelled by the customer (terminal state).
    Cancelled,
}

impl PaymentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
    ];

    /// Statuses a payment can still leave.
    pub const OPEN: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Processing];

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Success | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Returns true if moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        match (self, next) {
            (PaymentStatus::Pending, PaymentStatus::Processing) => true,
            (PaymentStatus::Pending | PaymentStatus::Processing, target) => target.is_terminal(),
            _ => false,
        }
    }

    /// Returns every status from which `target` may be reached.
    ///
    /// Used as the compare-and-swap guard for conditional updates.
    pub fn predecessors(target: PaymentStatus) -> Vec<PaymentStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(target))
            .collect()
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Delivery status of an order.
///
/// State transitions (forward only, stages may be skipped):
/// ```text
/// Pending ──► Confirmed ──► Shipped ──► Delivered
///    │            │            │
///    └────────────┴────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Placed, payment not yet confirmed.
    #[default]
    Pending,

    /// Payment confirmed.
    Confirmed,

    /// Handed to the courier.
    Shipped,

    /// Delivered to the customer (terminal state).
    Delivered,

    /// Cancelled (terminal state).
    Cancelled,
}

impl DeliveryStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [DeliveryStatus; 5] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Confirmed,
        DeliveryStatus::Shipped,
        DeliveryStatus::Delivered,
        DeliveryStatus::Cancelled,
    ];

    /// Returns every status from which `target` may be reached.
    pub fn predecessors(target: DeliveryStatus) -> Vec<DeliveryStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(target))
            .collect()
    }

    fn rank(&self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Confirmed => 1,
            DeliveryStatus::Shipped => 2,
            DeliveryStatus::Delivered => 3,
            DeliveryStatus::Cancelled => 4,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Confirmed => "confirmed",
            DeliveryStatus::Shipped => "shipped",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

/// Status of a shipment.
///
/// ```text
/// Pending ──► Approved ──► Completed
///    │           │
///    └───────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShippingStatus {
    /// Created with the order.
    #[default]
    Pending,

    /// Approved for dispatch.
    Approved,

    /// Shipped and closed (terminal state).
    Completed,

    /// Cancelled together with its order (terminal state).
    Cancelled,
}

impl ShippingStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ShippingStatus; 4] = [
        ShippingStatus::Pending,
        ShippingStatus::Approved,
        ShippingStatus::Completed,
        ShippingStatus::Cancelled,
    ];

    /// Returns every status from which `target` may be reached.
    pub fn predecessors(target: ShippingStatus) -> Vec<ShippingStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(target))
            .collect()
    }

    fn rank(&self) -> u8 {
        match self {
            ShippingStatus::Pending => 0,
            ShippingStatus::Approved => 1,
            ShippingStatus::Completed => 2,
            ShippingStatus::Cancelled => 3,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShippingStatus::Completed | ShippingStatus::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(&self, next: ShippingStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "Pending",
            ShippingStatus::Approved => "Approved",
            ShippingStatus::Completed => "Completed",
            ShippingStatus::Cancelled => "Cancelled",
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    /// Cash on delivery, no gateway involvement.
    #[serde(rename = "COD", alias = "cod")]
    Cod,

    /// Paid up front through the payment gateway.
    #[serde(alias = "prepaid")]
    Prepaid,
}

impl PaymentType {
    /// Returns the payment type name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cod => "COD",
            PaymentType::Prepaid => "Prepaid",
        }
    }
}

/// Outcome recorded in the payment audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLogStatus {
    /// A verified callback confirmed the payment.
    Success,
    /// A callback arrived for an already finished payment and was ignored.
    Duplicate,
    /// A callback failed signature verification.
    SignatureError,
    /// A callback referenced an unknown gateway order.
    NotFound,
    /// The customer cancelled the payment.
    Cancelled,
    /// The sweeper cancelled the payment after the timeout.
    AutoCancelled,
}

impl PaymentLogStatus {
    /// Returns the log status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentLogStatus::Success => "success",
            PaymentLogStatus::Duplicate => "duplicate",
            PaymentLogStatus::SignatureError => "signature_error",
            PaymentLogStatus::NotFound => "not_found",
            PaymentLogStatus::Cancelled => "cancelled",
            PaymentLogStatus::AutoCancelled => "auto_cancelled",
        }
    }
}

macro_rules! impl_status_text {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| DomainError::UnknownStatus {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_status_text!(
    PaymentStatus,
    "payment status",
    [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
    ]
);
impl_status_text!(
    DeliveryStatus,
    "delivery status",
    [
        DeliveryStatus::Pending,
        DeliveryStatus::Confirmed,
        DeliveryStatus::Shipped,
        DeliveryStatus::Delivered,
        DeliveryStatus::Cancelled,
    ]
);
impl_status_text!(
    ShippingStatus,
    "shipping status",
    [
        ShippingStatus::Pending,
        ShippingStatus::Approved,
        ShippingStatus::Completed,
        ShippingStatus::Cancelled,
    ]
);
impl_status_text!(PaymentType, "payment type", [PaymentType::Cod, PaymentType::Prepaid]);
impl_status_text!(
    PaymentLogStatus,
    "payment log status",
    [
        PaymentLogStatus::Success,
        PaymentLogStatus::Duplicate,
        PaymentLogStatus::SignatureError,
        PaymentLogStatus::NotFound,
        PaymentLogStatus::Cancelled,
        PaymentLogStatus::AutoCancelled,
    ]
);
