//! Admin order management: shipping/delivery updates, invoices and queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{
    DeliveryStatus, FulfillmentUpdate, Invoice, OrderAggregate, PaymentLog, ShippingStatus,
};
use serde::{Deserialize, Serialize};
use store::{CommerceStore, OrderPage, OrderQuery};

use crate::clock::Clock;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::sequence::SequenceGenerator;
use crate::services::{InvoiceRenderer, Notifier};

/// Requested status changes; `None` leaves a status as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub shipping_status: Option<ShippingStatus>,
    pub delivery_status: Option<DeliveryStatus>,
}

/// Order management after placement.
pub struct FulfillmentService<S> {
    store: S,
    sequences: SequenceGenerator<S>,
    invoices: Arc<dyn InvoiceRenderer>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<S> FulfillmentService<S>
where
    S: CommerceStore + Clone,
{
    pub fn new(
        store: S,
        invoices: Arc<dyn InvoiceRenderer>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: CheckoutConfig,
    ) -> Self {
        let sequences = SequenceGenerator::new(store.clone(), Arc::clone(&clock), config);
        Self {
            store,
            sequences,
            invoices,
            notifier,
            clock,
        }
    }

    /// Moves shipping and/or delivery status forward.
    ///
    /// The first shipping status other than `Pending` issues the order's
    /// invoice. An invoice number allocated for an update that then fails
    /// is not reused.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<OrderAggregate> {
        let aggregate = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        let mut change = FulfillmentUpdate {
            shipping_status: update.shipping_status,
            delivery_status: update.delivery_status,
            invoice: None,
            at: self.clock.now(),
        };
        aggregate.check_fulfillment(&change)?;

        let needs_invoice = aggregate.invoice.is_none()
            && update
                .shipping_status
                .is_some_and(|status| status != ShippingStatus::Pending);
        if needs_invoice {
            change.invoice = Some(self.issue_invoice(&aggregate, change.at).await?);
        }

        let updated = self.store.update_fulfillment(order_id, change).await?;
        tracing::info!(
            order_code = %updated.order.order_code,
            shipping_status = %updated.shipment.status,
            delivery_status = %updated.order.delivery_status,
            "Order status updated"
        );

        let notifier = Arc::clone(&self.notifier);
        let notice = updated.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_status_update(&notice).await {
                tracing::warn!(
                    order_code = %notice.order.order_code,
                    error = %e,
                    "Status update not sent"
                );
            }
        });

        Ok(updated)
    }

    async fn issue_invoice(
        &self,
        aggregate: &OrderAggregate,
        at: DateTime<Utc>,
    ) -> Result<Invoice> {
        let invoice_no = self.sequences.next_invoice_number().await?;
        let link = self.invoices.render_invoice(aggregate, &invoice_no).await?;
        let qr_ref = self.invoices.encode_qr(&link).await?;
        Ok(Invoice::new(invoice_no, at).with_document(link, Some(qr_ref)))
    }

    /// Loads an order aggregate.
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderAggregate> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// Loads an order only if it belongs to `user_id`.
    pub async fn get_order_for_user(&self, order_id: OrderId, user_id: UserId) -> Result<OrderAggregate> {
        self.get_order(order_id)
            .await
            .and_then(|aggregate| {
                if aggregate.order.user_id == user_id {
                    Ok(aggregate)
                } else {
                    Err(CheckoutError::OrderNotFound(order_id))
                }
            })
    }

    pub async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        Ok(self.store.list_orders(query).await?)
    }

    /// Deletes an order with its items, payment, shipment and invoice.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        self.store.delete_order(order_id).await?;
        tracing::info!("Order deleted");
        Ok(())
    }

    /// Audit trail of an order's payment, oldest first.
    pub async fn payment_logs(&self, order_id: OrderId) -> Result<Vec<PaymentLog>> {
        Ok(self.store.payment_logs(order_id).await?)
    }
}
