use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{
    FulfillmentUpdate, OrderAggregate, Payment, PaymentLog, PaymentTransition, SequenceCounter,
    SequenceValue, TransitionOutcome,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    OrderPage, OrderQuery, Result, StalePaymentQuery, StoreError,
    store::{CommerceStore, validate_aggregate_for_insert},
};

type CounterSlot = Arc<Mutex<Option<SequenceCounter>>>;

/// Guard holding a sequence lock; the lock is released on drop.
pub type SequenceGuard = OwnedMutexGuard<Option<SequenceCounter>>;

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, OrderAggregate>,
    logs: Vec<PaymentLog>,
}

/// In-memory commerce store for tests and database-less runs.
///
/// Orders and logs share one lock so every multi-row change is atomic.
/// Each sequence has its own async mutex.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    counters: Arc<Mutex<HashMap<String, CounterSlot>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns every stored payment log.
    pub async fn all_payment_logs(&self) -> Vec<PaymentLog> {
        self.tables.read().await.logs.clone()
    }

    /// Acquires the named sequence lock and holds it until the guard is dropped.
    pub async fn lock_sequence(&self, name: &str) -> SequenceGuard {
        self.counter_slot(name).await.lock_owned().await
    }

    /// Clears all orders, logs and counters.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.orders.clear();
        tables.logs.clear();
        self.counters.lock().await.clear();
    }

    async fn counter_slot(&self, name: &str) -> CounterSlot {
        let mut counters = self.counters.lock().await;
        counters.entry(name.to_string()).or_default().clone()
    }
}

fn newest_first(a: &OrderAggregate, b: &OrderAggregate) -> std::cmp::Ordering {
    b.order
        .created_at
        .cmp(&a.order.created_at)
        .then_with(|| b.order.order_code.cmp(&a.order.order_code))
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn next_sequence_value(
        &self,
        name: &str,
        bucket: &str,
        lock_timeout: Duration,
    ) -> Result<SequenceValue> {
        let slot = self.counter_slot(name).await;
        let mut counter = tokio::time::timeout(lock_timeout, slot.lock())
            .await
            .map_err(|_| StoreError::LockTimeout {
                sequence: name.to_string(),
            })?;

        let counter = counter.get_or_insert_with(|| SequenceCounter::new(name, bucket));
        Ok(counter.advance(bucket))
    }

    async fn insert_order(&self, aggregate: &OrderAggregate) -> Result<()> {
        validate_aggregate_for_insert(aggregate)?;

        let mut tables = self.tables.write().await;
        let order = &aggregate.order;

        // Unique constraint simulation
        for existing in tables.orders.values() {
            if existing.order.id == order.id {
                return Err(StoreError::ConcurrencyConflict(format!(
                    "Order {} already exists",
                    order.id
                )));
            }
            if existing.order.order_code == order.order_code {
                return Err(StoreError::ConcurrencyConflict(format!(
                    "Order code {} already exists",
                    order.order_code
                )));
            }
            if aggregate.payment.gateway_order_id.is_some()
                && existing.payment.gateway_order_id == aggregate.payment.gateway_order_id
            {
                return Err(StoreError::ConcurrencyConflict(
                    "Gateway order id already exists".to_string(),
                ));
            }
        }

        tables.orders.insert(order.id, aggregate.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderAggregate>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&order_id).cloned())
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderAggregate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|a| a.payment.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        let tables = self.tables.read().await;
        let mut matching: Vec<_> = tables
            .orders
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matching.sort_by(newest_first);

        let total = matching.len() as u64;
        let orders = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(OrderPage { total, orders })
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .orders
            .remove(&order_id)
            .map(|_| ())
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn transition_payment(
        &self,
        transition: PaymentTransition,
    ) -> Result<TransitionOutcome> {
        let mut tables = self.tables.write().await;

        let aggregate = tables
            .orders
            .values_mut()
            .find(|a| a.payment.id == transition.payment_id)
            .ok_or(StoreError::PaymentNotFound(transition.payment_id))?;

        let outcome = aggregate.apply_payment_transition(&transition);
        if outcome.is_applied()
            && let Some(log) = transition.log
        {
            tables.logs.push(log);
        }
        Ok(outcome)
    }

    async fn append_payment_log(&self, log: PaymentLog) -> Result<()> {
        self.tables.write().await.logs.push(log);
        Ok(())
    }

    async fn payment_logs(&self, order_id: OrderId) -> Result<Vec<PaymentLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .logs
            .iter()
            .filter(|log| log.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn find_stale_payments(&self, query: StalePaymentQuery) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut matching: Vec<_> = tables
            .orders
            .values()
            .filter(|a| query.matches(a))
            .map(|a| (a.order.created_at, a.payment.clone()))
            .collect();
        matching.sort_by_key(|(created_at, _)| *created_at);
        Ok(matching.into_iter().map(|(_, payment)| payment).collect())
    }

    async fn update_fulfillment(
        &self,
        order_id: OrderId,
        update: FulfillmentUpdate,
    ) -> Result<OrderAggregate> {
        let mut tables = self.tables.write().await;

        if let Some(invoice) = &update.invoice {
            let taken = tables.orders.values().any(|a| {
                a.invoice
                    .as_ref()
                    .is_some_and(|existing| existing.invoice_no == invoice.invoice_no)
            });
            if taken {
                return Err(StoreError::ConcurrencyConflict(format!(
                    "Invoice {} already exists",
                    invoice.invoice_no
                )));
            }
        }

        let aggregate = tables
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        aggregate.apply_fulfillment(&update)?;
        Ok(aggregate.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use common::{AddressId, UserId};
    use domain::{
        DeliveryStatus, Invoice, Money, OrderDraft, PaymentLogStatus, PaymentStatus, PaymentType,
        PricedLine, PricingPolicy, ProductId, ShippingStatus, VariationId,
    };

    use super::*;
    use crate::store::CommerceStoreExt;

    const LOCK_TIMEOUT: Duration = Duration::from_millis(200);

    fn create_test_order(code: &str, payment_type: PaymentType) -> OrderAggregate {
        let policy = PricingPolicy::default();
        let lines = vec![PricedLine {
            product_id: ProductId::new("P-1"),
            variation_id: VariationId::new("V-1"),
            quantity: 1,
            unit_price: Money::from_major(600),
        }];
        let breakdown = policy.price(&lines, None);
        OrderAggregate::place(
            OrderDraft {
                user_id: UserId::new(),
                order_code: code.to_string(),
                address_id: AddressId::new(),
                payment_type,
                currency: "INR".to_string(),
                gateway_order_id: (payment_type == PaymentType::Prepaid)
                    .then(|| format!("gw_{code}")),
                lines,
                breakdown,
                coupon: None,
                placed_at: Utc::now(),
            },
            &policy,
        )
    }

    #[tokio::test]
    async fn sequence_starts_at_one_and_increments() {
        let store = InMemoryStore::new();

        let first = store
            .next_sequence_value("order", "20261018", LOCK_TIMEOUT)
            .await
            .unwrap();
        let second = store
            .next_sequence_value("order", "20261018", LOCK_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(first.order_code(), "202610180001");
        assert_eq!(second.order_code(), "202610180002");
    }

    #[tokio::test]
    async fn sequences_are_independent_by_name() {
        let store = InMemoryStore::new();
        store
            .next_sequence_value("order", "20261018", LOCK_TIMEOUT)
            .await
            .unwrap();

        let invoice = store
            .next_sequence_value("invoice", "2026/10/18", LOCK_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(invoice.invoice_number(), "INV-2026/10/18/101");
    }

    #[tokio::test]
    async fn sequence_lock_times_out_while_held() {
        let store = InMemoryStore::new();
        let _guard = store.lock_sequence("order").await;

        let result = store
            .next_sequence_value("order", "20261018", Duration::from_millis(20))
            .await;

        assert!(matches!(result, Err(StoreError::LockTimeout { .. })));
    }

    #[tokio::test]
    async fn concurrent_sequence_values_are_distinct() {
        let store = InMemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .next_sequence_value("order", "20261018", Duration::from_secs(5))
                    .await
                    .unwrap()
                    .postfix
            }));
        }

        let mut postfixes = Vec::new();
        for handle in handles {
            postfixes.push(handle.await.unwrap());
        }
        postfixes.sort_unstable();
        assert_eq!(postfixes, (1..=50).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn insert_and_load_order() {
        let store = InMemoryStore::new();
        let aggregate = create_test_order("202610180001", PaymentType::Prepaid);

        store.insert_order(&aggregate).await.unwrap();

        let loaded = store.require_order(aggregate.id()).await.unwrap();
        assert_eq!(loaded, aggregate);

        let by_gateway = store
            .find_by_gateway_order_id("gw_202610180001")
            .await
            .unwrap();
        assert_eq!(by_gateway.map(|a| a.id()), Some(aggregate.id()));
    }

    #[tokio::test]
    async fn duplicate_order_code_is_rejected() {
        let store = InMemoryStore::new();
        store
            .insert_order(&create_test_order("202610180001", PaymentType::Cod))
            .await
            .unwrap();

        let result = store
            .insert_order(&create_test_order("202610180001", PaymentType::Cod))
            .await;

        assert!(matches!(result, Err(StoreError::ConcurrencyConflict(_))));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn inconsistent_aggregate_is_rejected() {
        let store = InMemoryStore::new();
        let mut aggregate = create_test_order("202610180001", PaymentType::Cod);
        aggregate.order.grand_total = Money::from_major(1);

        let result = store.insert_order(&aggregate).await;

        assert!(matches!(result, Err(StoreError::InvalidAggregate(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn list_orders_newest_first_with_paging() {
        let store = InMemoryStore::new();
        for i in 1..=20 {
            let mut aggregate = create_test_order(&format!("2026101800{i:02}"), PaymentType::Cod);
            aggregate.order.created_at = Utc::now() + ChronoDuration::seconds(i);
            store.insert_order(&aggregate).await.unwrap();
        }

        let page = store.list_orders(OrderQuery::new()).await.unwrap();
        assert_eq!(page.total, 20);
        assert_eq!(page.orders.len(), 15);
        assert_eq!(page.orders[0].order.order_code, "202610180020");

        let second = store
            .list_orders(OrderQuery::new().offset(15))
            .await
            .unwrap();
        assert_eq!(second.orders.len(), 5);

        let filtered = store
            .list_orders(OrderQuery::new().order_code_contains("0180007"))
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);
    }

    #[tokio::test]
    async fn transition_is_conditional() {
        let store = InMemoryStore::new();
        let aggregate = create_test_order("202610180001", PaymentType::Prepaid);
        store.insert_order(&aggregate).await.unwrap();
        let at = Utc::now();

        let success = PaymentTransition::to(aggregate.payment.id, PaymentStatus::Success, at)
            .cascade_delivery(DeliveryStatus::Confirmed)
            .with_log(
                PaymentLog::new(PaymentLogStatus::Success, at).for_payment(&aggregate.payment),
            );
        let failed = PaymentTransition::to(aggregate.payment.id, PaymentStatus::Failed, at)
            .cascade_delivery(DeliveryStatus::Cancelled)
            .with_log(
                PaymentLog::new(PaymentLogStatus::AutoCancelled, at)
                    .for_payment(&aggregate.payment),
            );

        assert!(store.transition_payment(success).await.unwrap().is_applied());
        let outcome = store.transition_payment(failed).await.unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Rejected {
                current: PaymentStatus::Success
            }
        );

        let logs = store.payment_logs(aggregate.id()).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, PaymentLogStatus::Success);

        let loaded = store.require_order(aggregate.id()).await.unwrap();
        assert_eq!(loaded.order.delivery_status, DeliveryStatus::Confirmed);
    }

    #[tokio::test]
    async fn transition_unknown_payment_fails() {
        let store = InMemoryStore::new();
        let aggregate = create_test_order("202610180001", PaymentType::Prepaid);

        let result = store
            .transition_payment(PaymentTransition::to(
                aggregate.payment.id,
                PaymentStatus::Success,
                Utc::now(),
            ))
            .await;

        assert!(matches!(result, Err(StoreError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn stale_payment_query_filters_type_status_and_age() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let mut old = create_test_order("202610180001", PaymentType::Prepaid);
        old.order.created_at = now - ChronoDuration::minutes(12);
        let mut fresh = create_test_order("202610180002", PaymentType::Prepaid);
        fresh.order.created_at = now - ChronoDuration::minutes(1);
        let mut cod = create_test_order("202610180003", PaymentType::Cod);
        cod.order.created_at = now - ChronoDuration::minutes(12);
        for aggregate in [&old, &fresh, &cod] {
            store.insert_order(aggregate).await.unwrap();
        }

        let stale = store
            .find_stale_payments(
                StalePaymentQuery::prepaid(PaymentStatus::OPEN)
                    .created_at_or_before(now - ChronoDuration::minutes(9)),
            )
            .await
            .unwrap();

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.payment.id);
    }

    #[tokio::test]
    async fn fulfillment_attaches_invoice_and_rejects_duplicate_number() {
        let store = InMemoryStore::new();
        let first = create_test_order("202610180001", PaymentType::Cod);
        let second = create_test_order("202610180002", PaymentType::Cod);
        store.insert_order(&first).await.unwrap();
        store.insert_order(&second).await.unwrap();

        let update = |invoice_no: &str| FulfillmentUpdate {
            shipping_status: Some(ShippingStatus::Approved),
            delivery_status: None,
            invoice: Some(Invoice::new(invoice_no, Utc::now())),
            at: Utc::now(),
        };

        let updated = store
            .update_fulfillment(first.id(), update("INV-2026/10/18/101"))
            .await
            .unwrap();
        assert_eq!(updated.shipment.status, ShippingStatus::Approved);
        assert!(updated.invoice.is_some());

        let result = store
            .update_fulfillment(second.id(), update("INV-2026/10/18/101"))
            .await;
        assert!(matches!(result, Err(StoreError::ConcurrencyConflict(_))));
    }

    #[tokio::test]
    async fn delete_keeps_payment_logs() {
        let store = InMemoryStore::new();
        let aggregate = create_test_order("202610180001", PaymentType::Prepaid);
        store.insert_order(&aggregate).await.unwrap();
        store
            .append_payment_log(
                PaymentLog::new(PaymentLogStatus::Duplicate, Utc::now())
                    .for_payment(&aggregate.payment),
            )
            .await
            .unwrap();

        store.delete_order(aggregate.id()).await.unwrap();

        assert!(!store.order_exists(aggregate.id()).await.unwrap());
        assert_eq!(store.payment_logs(aggregate.id()).await.unwrap().len(), 1);
        assert!(matches!(
            store.delete_order(aggregate.id()).await,
            Err(StoreError::OrderNotFound(_))
        ));
    }
}
