use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{
    FulfillmentUpdate, OrderAggregate, Payment, PaymentLog, PaymentTransition, SequenceValue,
    TransitionOutcome,
};

use crate::{OrderPage, OrderQuery, Result, StalePaymentQuery, StoreError};

/// Core trait for commerce persistence.
///
/// Implementations must be thread-safe (Send + Sync). Every method is a
/// single unit of work: it either fully applies or leaves no trace.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Hands out the next value of the named sequence for `bucket`.
    ///
    /// Runs under the sequence's serializing lock. Waiting for the lock is
    /// bounded by `lock_timeout`, after which `LockTimeout` is returned.
    async fn next_sequence_value(
        &self,
        name: &str,
        bucket: &str,
        lock_timeout: Duration,
    ) -> Result<SequenceValue>;

    /// Inserts a new order together with its payment, shipment, items and
    /// invoice. Either all rows are written or none.
    async fn insert_order(&self, aggregate: &OrderAggregate) -> Result<()>;

    /// Loads an order aggregate by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderAggregate>>;

    /// Loads the order whose payment carries this gateway intent id.
    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderAggregate>>;

    /// Lists orders newest first.
    async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage>;

    /// Deletes an order with its items, payment, shipment and invoice.
    ///
    /// Payment logs are kept.
    async fn delete_order(&self, order_id: OrderId) -> Result<()>;

    /// Applies a compare-and-swap payment transition.
    ///
    /// The payment status, the cascaded order/shipment statuses and the log
    /// row are written together, and only while the payment is still in one
    /// of `transition.expected`.
    async fn transition_payment(&self, transition: PaymentTransition)
    -> Result<TransitionOutcome>;

    /// Appends a standalone audit row.
    async fn append_payment_log(&self, log: PaymentLog) -> Result<()>;

    /// Returns the audit trail of an order, oldest first.
    async fn payment_logs(&self, order_id: OrderId) -> Result<Vec<PaymentLog>>;

    /// Returns payments selected by the sweeper query, oldest first.
    async fn find_stale_payments(&self, query: StalePaymentQuery) -> Result<Vec<Payment>>;

    /// Validates and applies an admin status change under the order's lock.
    async fn update_fulfillment(
        &self,
        order_id: OrderId,
        update: FulfillmentUpdate,
    ) -> Result<OrderAggregate>;
}

/// Extension trait providing convenience methods for commerce stores.
#[async_trait]
pub trait CommerceStoreExt: CommerceStore {
    /// Loads an order, failing with `OrderNotFound` if it does not exist.
    async fn require_order(&self, order_id: OrderId) -> Result<OrderAggregate> {
        self.get_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    /// Checks if an order exists.
    async fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.get_order(order_id).await?.is_some())
    }
}

// Blanket implementation for all CommerceStore implementations
impl<T: CommerceStore + ?Sized> CommerceStoreExt for T {}

/// Checks that an aggregate is internally consistent before it is inserted.
pub fn validate_aggregate_for_insert(aggregate: &OrderAggregate) -> Result<()> {
    let order = &aggregate.order;

    if aggregate.items.is_empty() {
        return Err(StoreError::InvalidAggregate(
            "Cannot insert an order without items".to_string(),
        ));
    }
    if order.payment_id != aggregate.payment.id || aggregate.payment.order_id != order.id {
        return Err(StoreError::InvalidAggregate(
            "Payment is not linked to the order".to_string(),
        ));
    }
    if order.shipment_id != aggregate.shipment.id {
        return Err(StoreError::InvalidAggregate(
            "Shipment is not linked to the order".to_string(),
        ));
    }
    if aggregate.items.iter().any(|item| item.order_id != order.id) {
        return Err(StoreError::InvalidAggregate(
            "All items must belong to the order".to_string(),
        ));
    }
    if order.invoice_id != aggregate.invoice.as_ref().map(|invoice| invoice.id) {
        return Err(StoreError::InvalidAggregate(
            "Invoice reference does not match".to_string(),
        ));
    }
    let recomputed = aggregate.recomputed_grand_total();
    if recomputed != order.grand_total {
        return Err(StoreError::InvalidAggregate(format!(
            "Grand total {} does not match recomputed total {}",
            order.grand_total, recomputed
        )));
    }
    Ok(())
}
