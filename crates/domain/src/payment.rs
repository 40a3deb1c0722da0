//! Payment records, conditional transitions and the audit log.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, PaymentLogId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::status::{DeliveryStatus, PaymentLogStatus, PaymentStatus, PaymentType, ShippingStatus};

/// The payment attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    /// Gateway-side intent id, only set for prepaid payments.
    pub gateway_order_id: Option<String>,
    /// Gateway payment id, filled when the payment succeeds.
    pub gateway_transaction_id: Option<String>,
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Returns true if the payment can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A compare-and-swap status change of one payment and its order aggregate.
///
/// The change is applied only while the payment is still in one of the
/// `expected` statuses; otherwise it is rejected and nothing is written.
/// Cascaded order/shipment statuses and the log row are written in the same
/// unit of work as the payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransition {
    pub payment_id: PaymentId,
    pub expected: Vec<PaymentStatus>,
    pub target: PaymentStatus,
    pub transaction_id: Option<String>,
    pub raw_response: Option<serde_json::Value>,
    pub delivery_status: Option<DeliveryStatus>,
    pub shipping_status: Option<ShippingStatus>,
    pub log: Option<PaymentLog>,
    pub at: DateTime<Utc>,
}

impl PaymentTransition {
    /// Moves a payment to `target` from any status the state machine allows.
    pub fn to(payment_id: PaymentId, target: PaymentStatus, at: DateTime<Utc>) -> Self {
        Self {
            payment_id,
            expected: PaymentStatus::predecessors(target),
            target,
            transaction_id: None,
            raw_response: None,
            delivery_status: None,
            shipping_status: None,
            log: None,
            at,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_raw_response(mut self, raw: serde_json::Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    /// Also moves the order's delivery status.
    pub fn cascade_delivery(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status = Some(status);
        self
    }

    /// Also moves the shipment status.
    pub fn cascade_shipping(mut self, status: ShippingStatus) -> Self {
        self.shipping_status = Some(status);
        self
    }

    /// Appends `log` if, and only if, the transition is applied.
    pub fn with_log(mut self, log: PaymentLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns true if a payment currently in `current` satisfies the guard.
    pub fn accepts(&self, current: PaymentStatus) -> bool {
        self.expected.contains(&current)
    }
}

/// Result of a conditional payment transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The guard held and the payment was updated.
    Applied(Payment),
    /// The payment had already moved on; nothing was written.
    Rejected { current: PaymentStatus },
}

impl TransitionOutcome {
    /// Returns true if the transition was written.
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// One append-only audit row describing a reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLog {
    pub id: PaymentLogId,
    pub order_id: Option<OrderId>,
    pub payment_id: Option<PaymentId>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: PaymentLogStatus,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentLog {
    /// Starts a log row with the given outcome.
    pub fn new(status: PaymentLogStatus, at: DateTime<Utc>) -> Self {
        Self {
            id: PaymentLogId::new(),
            order_id: None,
            payment_id: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            status,
            request_payload: None,
            response_payload: None,
            created_at: at,
        }
    }

    pub fn for_payment(mut self, payment: &Payment) -> Self {
        self.order_id = Some(payment.order_id);
        self.payment_id = Some(payment.id);
        if self.gateway_order_id.is_none() {
            self.gateway_order_id = payment.gateway_order_id.clone();
        }
        self
    }

    pub fn with_gateway_ids(
        mut self,
        gateway_order_id: impl Into<String>,
        gateway_payment_id: Option<String>,
    ) -> Self {
        self.gateway_order_id = Some(gateway_order_id.into());
        self.gateway_payment_id = gateway_payment_id;
        self
    }

    pub fn with_request(mut self, request: serde_json::Value) -> Self {
        self.request_payload = Some(request);
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response_payload = Some(response.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_guard_comes_from_state_machine() {
        let transition =
            PaymentTransition::to(PaymentId::new(), PaymentStatus::Failed, Utc::now());
        assert!(transition.accepts(PaymentStatus::Pending));
        assert!(transition.accepts(PaymentStatus::Processing));
        assert!(!transition.accepts(PaymentStatus::Success));
        assert!(!transition.accepts(PaymentStatus::Cancelled));
    }

    #[test]
    fn test_processing_only_from_pending() {
        let transition =
            PaymentTransition::to(PaymentId::new(), PaymentStatus::Processing, Utc::now());
        assert_eq!(transition.expected, vec![PaymentStatus::Pending]);
    }

    #[test]
    fn test_log_builder_copies_payment_references() {
        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            order_id: OrderId::new(),
            user_id: UserId::new(),
            payment_type: PaymentType::Prepaid,
            amount: Money::from_major(530),
            currency: "INR".to_string(),
            status: PaymentStatus::Pending,
            gateway_order_id: Some("order_abc".to_string()),
            gateway_transaction_id: None,
            raw_response: None,
            created_at: now,
            updated_at: now,
        };

        let log = PaymentLog::new(PaymentLogStatus::AutoCancelled, now)
            .for_payment(&payment)
            .with_response("timed out");

        assert_eq!(log.order_id, Some(payment.order_id));
        assert_eq!(log.payment_id, Some(payment.id));
        assert_eq!(log.gateway_order_id.as_deref(), Some("order_abc"));
        assert_eq!(log.response_payload.as_deref(), Some("timed out"));
    }
}
