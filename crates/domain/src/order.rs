//! Orders, their line items and the aggregate that is persisted as one unit.

use chrono::{DateTime, Utc};
use common::{AddressId, CouponId, InvoiceId, OrderId, OrderItemId, PaymentId, ShipmentId, UserId};
use serde::{Deserialize, Serialize};

use crate::cart::{ProductId, VariationId};
use crate::error::DomainError;
use crate::invoice::Invoice;
use crate::money::Money;
use crate::payment::{Payment, PaymentTransition, TransitionOutcome};
use crate::pricing::{PriceBreakdown, PricedLine, PricingPolicy};
use crate::shipment::Shipment;
use crate::status::{DeliveryStatus, PaymentStatus, PaymentType, ShippingStatus};

/// Order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Human-readable code, unique across all orders.
    pub order_code: String,
    pub subtotal: Money,
    /// Informational; not part of the grand total.
    pub tax_price: Money,
    pub shipping_charge: Money,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<String>,
    pub coupon_discount: Money,
    pub grand_total: Money,
    pub payment_type: PaymentType,
    pub delivery_status: DeliveryStatus,
    pub payment_id: PaymentId,
    pub shipment_id: ShipmentId,
    pub invoice_id: Option<InvoiceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One purchased line, priced at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variation_id: VariationId,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
    pub tax: Money,
}

/// Everything needed to materialize a new order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub order_code: String,
    pub address_id: AddressId,
    pub payment_type: PaymentType,
    pub currency: String,
    /// Gateway intent id; required for prepaid orders.
    pub gateway_order_id: Option<String>,
    pub lines: Vec<PricedLine>,
    pub breakdown: PriceBreakdown,
    pub coupon: Option<(CouponId, String)>,
    pub placed_at: DateTime<Utc>,
}

/// An order together with its payment, shipment, items and invoice.
///
/// This is the unit that is inserted atomically: either every part exists
/// or none does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAggregate {
    pub order: Order,
    pub payment: Payment,
    pub shipment: Shipment,
    pub items: Vec<OrderItem>,
    pub invoice: Option<Invoice>,
}

/// An admin change to shipping and delivery status.
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentUpdate {
    pub shipping_status: Option<ShippingStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    /// Attached only if the order has no invoice yet.
    pub invoice: Option<Invoice>,
    pub at: DateTime<Utc>,
}

impl OrderAggregate {
    /// Builds a new aggregate from a priced draft.
    ///
    /// Every record starts in its initial status: payment `pending`,
    /// delivery `pending`, shipment `Pending`.
    pub fn place(draft: OrderDraft, policy: &PricingPolicy) -> Self {
        let at = draft.placed_at;
        let order_id = OrderId::new();
        let payment_id = PaymentId::new();

        let items = draft
            .lines
            .iter()
            .map(|line| {
                let total = line.total().round();
                OrderItem {
                    id: OrderItemId::new(),
                    order_id,
                    product_id: line.product_id.clone(),
                    variation_id: line.variation_id.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    total,
                    tax: policy.tax_on(total),
                }
            })
            .collect();

        let shipment = Shipment::pending(draft.address_id, draft.breakdown.shipping_charge, at);

        let payment = Payment {
            id: payment_id,
            order_id,
            user_id: draft.user_id,
            payment_type: draft.payment_type,
            amount: draft.breakdown.grand_total,
            currency: draft.currency,
            status: PaymentStatus::Pending,
            gateway_order_id: draft.gateway_order_id,
            gateway_transaction_id: None,
            raw_response: None,
            created_at: at,
            updated_at: at,
        };

        let (coupon_id, coupon_code) = match draft.coupon {
            Some((id, code)) => (Some(id), Some(code)),
            None => (None, None),
        };

        let order = Order {
            id: order_id,
            user_id: draft.user_id,
            order_code: draft.order_code,
            subtotal: draft.breakdown.subtotal,
            tax_price: draft.breakdown.tax,
            shipping_charge: draft.breakdown.shipping_charge,
            coupon_id,
            coupon_code,
            coupon_discount: draft.breakdown.discount,
            grand_total: draft.breakdown.grand_total,
            payment_type: draft.payment_type,
            delivery_status: DeliveryStatus::Pending,
            payment_id,
            shipment_id: shipment.id,
            invoice_id: None,
            created_at: at,
            updated_at: at,
        };

        Self {
            order,
            payment,
            shipment,
            items,
            invoice: None,
        }
    }

    pub fn id(&self) -> OrderId {
        self.order.id
    }

    /// Sum of the stored item totals.
    pub fn items_subtotal(&self) -> Money {
        self.items.iter().map(|item| item.total).sum()
    }

    /// Grand total recomputed from the stored parts.
    ///
    /// Always equals `order.grand_total` for a well-formed aggregate.
    pub fn recomputed_grand_total(&self) -> Money {
        (self.items_subtotal() + self.order.shipping_charge - self.order.coupon_discount).round()
    }

    /// Applies a conditional payment transition in memory.
    ///
    /// Leaves the aggregate untouched and returns `Rejected` when the
    /// payment is not in one of the expected statuses.
    pub fn apply_payment_transition(&mut self, transition: &PaymentTransition) -> TransitionOutcome {
        let current = self.payment.status;
        if !transition.accepts(current) {
            return TransitionOutcome::Rejected { current };
        }

        self.payment.status = transition.target;
        if let Some(transaction_id) = &transition.transaction_id {
            self.payment.gateway_transaction_id = Some(transaction_id.clone());
        }
        if let Some(raw) = &transition.raw_response {
            self.payment.raw_response = Some(raw.clone());
        }
        self.payment.updated_at = transition.at;

        // Cascades only move forward; terminal or later states are kept.
        if let Some(delivery) = transition.delivery_status
            && self.order.delivery_status.can_transition_to(delivery)
        {
            self.order.delivery_status = delivery;
            self.order.updated_at = transition.at;
        }
        if let Some(shipping) = transition.shipping_status
            && self.shipment.status.can_transition_to(shipping)
        {
            self.shipment.status = shipping;
            self.shipment.updated_at = transition.at;
        }

        TransitionOutcome::Applied(self.payment.clone())
    }

    /// Checks an admin status change against both state machines.
    ///
    /// Setting a status to its current value is allowed and changes nothing.
    pub fn check_fulfillment(&self, update: &FulfillmentUpdate) -> Result<(), DomainError> {
        if let Some(next) = update.shipping_status {
            let current = self.shipment.status;
            if next != current && !current.can_transition_to(next) {
                return Err(DomainError::InvalidTransition {
                    entity: "shipping",
                    from: current.to_string(),
                    to: next.to_string(),
                });
            }
        }
        if let Some(next) = update.delivery_status {
            let current = self.order.delivery_status;
            if next != current && !current.can_transition_to(next) {
                return Err(DomainError::InvalidTransition {
                    entity: "delivery",
                    from: current.to_string(),
                    to: next.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates and applies an admin status change.
    ///
    /// Returns true if an invoice was attached by this update.
    pub fn apply_fulfillment(&mut self, update: &FulfillmentUpdate) -> Result<bool, DomainError> {
        self.check_fulfillment(update)?;

        if let Some(next) = update.shipping_status
            && next != self.shipment.status
        {
            self.shipment.status = next;
            self.shipment.updated_at = update.at;
        }
        if let Some(next) = update.delivery_status
            && next != self.order.delivery_status
        {
            self.order.delivery_status = next;
            self.order.updated_at = update.at;
        }

        let mut attached = false;
        if self.invoice.is_none()
            && let Some(invoice) = &update.invoice
        {
            self.order.invoice_id = Some(invoice.id);
            self.order.updated_at = update.at;
            self.invoice = Some(invoice.clone());
            attached = true;
        }
        Ok(attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentLog;
    use crate::status::PaymentLogStatus;

    fn draft(payment_type: PaymentType) -> OrderDraft {
        let policy = PricingPolicy::default();
        let lines = vec![PricedLine {
            product_id: ProductId::new("P-1"),
            variation_id: VariationId::new("V-1"),
            quantity: 2,
            unit_price: Money::from_major(250),
        }];
        let breakdown = policy.price(&lines, Some(Money::from_major(50)));
        OrderDraft {
            user_id: UserId::new(),
            order_code: "202610180001".to_string(),
            address_id: AddressId::new(),
            payment_type,
            currency: "INR".to_string(),
            gateway_order_id: Some("order_gw_1".to_string()),
            lines,
            breakdown,
            coupon: Some((CouponId::new(), "SAVE50".to_string())),
            placed_at: Utc::now(),
        }
    }

    #[test]
    fn test_place_builds_consistent_aggregate() {
        let aggregate = OrderAggregate::place(draft(PaymentType::Prepaid), &PricingPolicy::default());

        assert_eq!(aggregate.order.payment_id, aggregate.payment.id);
        assert_eq!(aggregate.order.shipment_id, aggregate.shipment.id);
        assert_eq!(aggregate.payment.order_id, aggregate.order.id);
        assert!(aggregate.items.iter().all(|i| i.order_id == aggregate.order.id));
        assert_eq!(aggregate.payment.amount, aggregate.order.grand_total);
        assert_eq!(aggregate.order.grand_total, Money::from_major(530));
        assert_eq!(aggregate.recomputed_grand_total(), aggregate.order.grand_total);
        assert_eq!(aggregate.items[0].tax, Money::from_major(90));
        assert_eq!(aggregate.order.coupon_code.as_deref(), Some("SAVE50"));
        assert_eq!(aggregate.payment.status, PaymentStatus::Pending);
        assert_eq!(aggregate.order.delivery_status, DeliveryStatus::Pending);
        assert_eq!(aggregate.shipment.status, ShippingStatus::Pending);
        assert_eq!(aggregate.shipment.shipping_type, "Home");
        assert!(aggregate.invoice.is_none());
    }

    #[test]
    fn test_transition_applies_cascades() {
        let mut aggregate =
            OrderAggregate::place(draft(PaymentType::Prepaid), &PricingPolicy::default());
        let at = Utc::now();
        let transition = PaymentTransition::to(aggregate.payment.id, PaymentStatus::Cancelled, at)
            .cascade_delivery(DeliveryStatus::Cancelled)
            .cascade_shipping(ShippingStatus::Cancelled)
            .with_log(PaymentLog::new(PaymentLogStatus::Cancelled, at));

        let outcome = aggregate.apply_payment_transition(&transition);

        assert!(outcome.is_applied());
        assert_eq!(aggregate.payment.status, PaymentStatus::Cancelled);
        assert_eq!(aggregate.order.delivery_status, DeliveryStatus::Cancelled);
        assert_eq!(aggregate.shipment.status, ShippingStatus::Cancelled);
    }

    #[test]
    fn test_cascades_never_move_fulfillment_backward() {
        let mut aggregate =
            OrderAggregate::place(draft(PaymentType::Prepaid), &PricingPolicy::default());
        aggregate.order.delivery_status = DeliveryStatus::Delivered;
        aggregate.shipment.status = ShippingStatus::Completed;
        let at = Utc::now();
        let transition = PaymentTransition::to(aggregate.payment.id, PaymentStatus::Failed, at)
            .cascade_delivery(DeliveryStatus::Cancelled)
            .cascade_shipping(ShippingStatus::Cancelled);

        let outcome = aggregate.apply_payment_transition(&transition);

        assert!(outcome.is_applied());
        assert_eq!(aggregate.payment.status, PaymentStatus::Failed);
        assert_eq!(aggregate.order.delivery_status, DeliveryStatus::Delivered);
        assert_eq!(aggregate.shipment.status, ShippingStatus::Completed);

        let mut shipped =
            OrderAggregate::place(draft(PaymentType::Prepaid), &PricingPolicy::default());
        shipped.order.delivery_status = DeliveryStatus::Shipped;
        let success = PaymentTransition::to(shipped.payment.id, PaymentStatus::Success, at)
            .cascade_delivery(DeliveryStatus::Confirmed);

        assert!(shipped.apply_payment_transition(&success).is_applied());
        assert_eq!(shipped.order.delivery_status, DeliveryStatus::Shipped);
    }

    #[test]
    fn test_transition_rejected_when_terminal() {
        let mut aggregate =
            OrderAggregate::place(draft(PaymentType::Prepaid), &PricingPolicy::default());
        aggregate.payment.status = PaymentStatus::Success;
        let before = aggregate.clone();

        let transition =
            PaymentTransition::to(aggregate.payment.id, PaymentStatus::Failed, Utc::now())
                .cascade_delivery(DeliveryStatus::Cancelled);
        let outcome = aggregate.apply_payment_transition(&transition);

        assert_eq!(
            outcome,
            TransitionOutcome::Rejected {
                current: PaymentStatus::Success
            }
        );
        assert_eq!(aggregate, before);
    }

    #[test]
    fn test_fulfillment_attaches_invoice_once() {
        let mut aggregate = OrderAggregate::place(draft(PaymentType::Cod), &PricingPolicy::default());
        let first = Invoice::new("INV-2026/10/18/101", Utc::now());
        let update = FulfillmentUpdate {
            shipping_status: Some(ShippingStatus::Approved),
            delivery_status: Some(DeliveryStatus::Confirmed),
            invoice: Some(first.clone()),
            at: Utc::now(),
        };
        assert!(aggregate.apply_fulfillment(&update).unwrap());

        let second = FulfillmentUpdate {
            shipping_status: Some(ShippingStatus::Completed),
            delivery_status: Some(DeliveryStatus::Shipped),
            invoice: Some(Invoice::new("INV-2026/10/18/102", Utc::now())),
            at: Utc::now(),
        };
        assert!(!aggregate.apply_fulfillment(&second).unwrap());

        assert_eq!(aggregate.invoice.as_ref().map(|i| i.id), Some(first.id));
        assert_eq!(aggregate.order.invoice_id, Some(first.id));
        assert_eq!(aggregate.shipment.status, ShippingStatus::Completed);
    }

    #[test]
    fn test_fulfillment_rejects_backward_move() {
        let mut aggregate = OrderAggregate::place(draft(PaymentType::Cod), &PricingPolicy::default());
        aggregate.order.delivery_status = DeliveryStatus::Delivered;

        let update = FulfillmentUpdate {
            shipping_status: None,
            delivery_status: Some(DeliveryStatus::Confirmed),
            invoice: None,
            at: Utc::now(),
        };
        let result = aggregate.apply_fulfillment(&update);

        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition { entity: "delivery", .. })
        ));
        assert_eq!(aggregate.order.delivery_status, DeliveryStatus::Delivered);
    }

    #[test]
    fn test_fulfillment_same_status_is_noop() {
        let mut aggregate = OrderAggregate::place(draft(PaymentType::Cod), &PricingPolicy::default());
        let update = FulfillmentUpdate {
            shipping_status: Some(ShippingStatus::Pending),
            delivery_status: Some(DeliveryStatus::Pending),
            invoice: None,
            at: Utc::now(),
        };
        assert!(!aggregate.apply_fulfillment(&update).unwrap());
    }
}
