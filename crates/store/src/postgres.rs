use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::{
    AddressId, CouponId, InvoiceId, OrderId, OrderItemId, PaymentId, PaymentLogId, ShipmentId,
    UserId,
};
use domain::{
    DeliveryStatus, FulfillmentUpdate, Invoice, Money, Order, OrderAggregate, OrderItem, Payment,
    PaymentLog, PaymentTransition, SequenceCounter, SequenceValue, Shipment, ShippingStatus,
    TransitionOutcome,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderPage, OrderQuery, Result, StalePaymentQuery, StoreError,
    store::{CommerceStore, validate_aggregate_for_insert},
};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// SQLSTATE raised on unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

const AGGREGATE_SELECT: &str = r#"
    SELECT
        o.id, o.user_id, o.order_code, o.subtotal, o.tax_price, o.shipping_charge,
        o.coupon_id, o.coupon_code, o.coupon_discount, o.grand_total, o.payment_type,
        o.delivery_status, o.payment_id, o.shipment_id, o.invoice_id,
        o.created_at, o.updated_at,
        p.user_id AS p_user_id, p.amount AS p_amount, p.currency AS p_currency,
        p.payment_status AS p_status, p.gateway_order_id AS p_gateway_order_id,
        p.gateway_transaction_id AS p_gateway_transaction_id,
        p.raw_response AS p_raw_response, p.created_at AS p_created_at,
        p.updated_at AS p_updated_at,
        s.shipping_status AS s_status, s.shipping_type AS s_shipping_type,
        s.courier AS s_courier, s.address_id AS s_address_id,
        s.shipping_charge AS s_shipping_charge,
        s.shipping_delivery_id AS s_shipping_delivery_id,
        s.raw_response AS s_raw_response, s.created_at AS s_created_at,
        s.updated_at AS s_updated_at,
        i.invoice_no AS i_invoice_no, i.document_link AS i_document_link,
        i.qr_ref AS i_qr_ref, i.issued_at AS i_issued_at
    FROM orders o
    JOIN payments p ON p.id = o.payment_id
    JOIN shipments s ON s.id = o.shipment_id
    LEFT JOIN invoices i ON i.id = o.invoice_id
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, order_id, user_id, payment_type, amount, currency, payment_status,
    gateway_order_id, gateway_transaction_id, raw_response, created_at, updated_at
"#;

/// PostgreSQL-backed commerce store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn money(row: &PgRow, column: &str) -> Result<Money> {
        Ok(Money::new(row.try_get::<Decimal, _>(column)?))
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            order_code: row.try_get("order_code")?,
            subtotal: Self::money(row, "subtotal")?,
            tax_price: Self::money(row, "tax_price")?,
            shipping_charge: Self::money(row, "shipping_charge")?,
            coupon_id: row
                .try_get::<Option<Uuid>, _>("coupon_id")?
                .map(CouponId::from_uuid),
            coupon_code: row.try_get("coupon_code")?,
            coupon_discount: Self::money(row, "coupon_discount")?,
            grand_total: Self::money(row, "grand_total")?,
            payment_type: row.try_get::<String, _>("payment_type")?.parse()?,
            delivery_status: row.try_get::<String, _>("delivery_status")?.parse()?,
            payment_id: PaymentId::from_uuid(row.try_get::<Uuid, _>("payment_id")?),
            shipment_id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("shipment_id")?),
            invoice_id: row
                .try_get::<Option<Uuid>, _>("invoice_id")?
                .map(InvoiceId::from_uuid),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_aggregate(row: &PgRow, items: Vec<OrderItem>) -> Result<OrderAggregate> {
        let order = Self::row_to_order(row)?;

        let payment = Payment {
            id: order.payment_id,
            order_id: order.id,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("p_user_id")?),
            payment_type: order.payment_type,
            amount: Self::money(row, "p_amount")?,
            currency: row.try_get("p_currency")?,
            status: row.try_get::<String, _>("p_status")?.parse()?,
            gateway_order_id: row.try_get("p_gateway_order_id")?,
            gateway_transaction_id: row.try_get("p_gateway_transaction_id")?,
            raw_response: row.try_get("p_raw_response")?,
            created_at: row.try_get("p_created_at")?,
            updated_at: row.try_get("p_updated_at")?,
        };

        let shipment = Shipment {
            id: order.shipment_id,
            status: row.try_get::<String, _>("s_status")?.parse()?,
            shipping_type: row.try_get("s_shipping_type")?,
            courier: row.try_get("s_courier")?,
            address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("s_address_id")?),
            shipping_charge: Self::money(row, "s_shipping_charge")?,
            shipping_delivery_id: row.try_get("s_shipping_delivery_id")?,
            raw_response: row.try_get("s_raw_response")?,
            created_at: row.try_get("s_created_at")?,
            updated_at: row.try_get("s_updated_at")?,
        };

        let invoice = match order.invoice_id {
            Some(id) => Some(Invoice {
                id,
                invoice_no: row.try_get("i_invoice_no")?,
                document_link: row.try_get("i_document_link")?,
                qr_ref: row.try_get("i_qr_ref")?,
                issued_at: row.try_get("i_issued_at")?,
            }),
            None => None,
        };

        Ok(OrderAggregate {
            order,
            payment,
            shipment,
            items,
            invoice,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: row.try_get::<String, _>("product_id")?.into(),
            variation_id: row.try_get::<String, _>("variation_id")?.into(),
            quantity: u32::try_from(row.try_get::<i64, _>("quantity")?).map_err(|_| {
                StoreError::InvalidAggregate("Stored quantity out of range".to_string())
            })?,
            unit_price: Self::money(row, "unit_price")?,
            total: Self::money(row, "total")?,
            tax: Self::money(row, "tax")?,
        })
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            payment_type: row.try_get::<String, _>("payment_type")?.parse()?,
            amount: Self::money(row, "amount")?,
            currency: row.try_get("currency")?,
            status: row.try_get::<String, _>("payment_status")?.parse()?,
            gateway_order_id: row.try_get("gateway_order_id")?,
            gateway_transaction_id: row.try_get("gateway_transaction_id")?,
            raw_response: row.try_get("raw_response")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_log(row: &PgRow) -> Result<PaymentLog> {
        Ok(PaymentLog {
            id: PaymentLogId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            payment_id: row
                .try_get::<Option<Uuid>, _>("payment_id")?
                .map(PaymentId::from_uuid),
            gateway_order_id: row.try_get("gateway_order_id")?,
            gateway_payment_id: row.try_get("gateway_payment_id")?,
            status: row.try_get::<String, _>("status")?.parse()?,
            request_payload: row.try_get("request_payload")?,
            response_payload: row.try_get("response_payload")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Loads items for several orders at once, grouped by order.
    async fn load_items(
        conn: &mut PgConnection,
        order_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, variation_id, quantity, unit_price, total, tax
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = Self::row_to_item(row)?;
            grouped.entry(item.order_id.as_uuid()).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn load_aggregates(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<OrderAggregate>> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut items = Self::load_items(conn, &ids).await?;

        rows.iter()
            .zip(&ids)
            .map(|(row, id)| Self::row_to_aggregate(row, items.remove(id).unwrap_or_default()))
            .collect()
    }

    async fn load_one(
        conn: &mut PgConnection,
        condition: &str,
        bind: impl AsRef<str>,
    ) -> Result<Option<OrderAggregate>> {
        let sql = format!("{AGGREGATE_SELECT} WHERE {condition}");
        let row = sqlx::query(&sql)
            .bind(bind.as_ref())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Self::load_aggregates(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn load_by_id(conn: &mut PgConnection, order_id: OrderId) -> Result<Option<OrderAggregate>> {
        let sql = format!("{AGGREGATE_SELECT} WHERE o.id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Self::load_aggregates(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

fn map_unique_violation(error: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
    {
        return StoreError::ConcurrencyConflict(format!(
            "{what} violates {}",
            db_err.constraint().unwrap_or("a unique constraint")
        ));
    }
    StoreError::Database(error)
}

fn map_lock_timeout(error: sqlx::Error, sequence: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
    {
        return StoreError::LockTimeout {
            sequence: sequence.to_string(),
        };
    }
    StoreError::Database(error)
}

async fn insert_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO invoices (id, invoice_no, document_link, qr_ref, issued_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(invoice.id.as_uuid())
    .bind(&invoice.invoice_no)
    .bind(&invoice.document_link)
    .bind(&invoice.qr_ref)
    .bind(invoice.issued_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, "Invoice"))?;
    Ok(())
}

async fn insert_log(conn: &mut PgConnection, log: &PaymentLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payment_logs (id, order_id, payment_id, gateway_order_id, gateway_payment_id,
                                  status, request_payload, response_payload, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(log.id.as_uuid())
    .bind(log.order_id.map(|id| id.as_uuid()))
    .bind(log.payment_id.map(|id| id.as_uuid()))
    .bind(&log.gateway_order_id)
    .bind(&log.gateway_payment_id)
    .bind(log.status.as_str())
    .bind(&log.request_payload)
    .bind(&log.response_payload)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn next_sequence_value(
        &self,
        name: &str,
        bucket: &str,
        lock_timeout: Duration,
    ) -> Result<SequenceValue> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters; the value is an integer.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            lock_timeout.as_millis().max(1)
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sequence_counters (name, prefix, postfix)
            VALUES ($1, $2, 1)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(bucket)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_lock_timeout(e, name))?;

        let row = sqlx::query("SELECT prefix, postfix FROM sequence_counters WHERE name = $1 FOR UPDATE")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_lock_timeout(e, name))?;

        let mut counter = SequenceCounter {
            name: name.to_string(),
            prefix: row.try_get("prefix")?,
            postfix: row.try_get("postfix")?,
        };
        let value = counter.advance(bucket);

        sqlx::query("UPDATE sequence_counters SET prefix = $2, postfix = $3 WHERE name = $1")
            .bind(name)
            .bind(&counter.prefix)
            .bind(counter.postfix)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(value)
    }

    async fn insert_order(&self, aggregate: &OrderAggregate) -> Result<()> {
        validate_aggregate_for_insert(aggregate)?;

        let order = &aggregate.order;
        let payment = &aggregate.payment;
        let shipment = &aggregate.shipment;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shipments (id, shipping_status, shipping_type, courier, address_id,
                                   shipping_charge, shipping_delivery_id, raw_response,
                                   created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(shipment.status.as_str())
        .bind(&shipment.shipping_type)
        .bind(&shipment.courier)
        .bind(shipment.address_id.as_uuid())
        .bind(shipment.shipping_charge.amount())
        .bind(&shipment.shipping_delivery_id)
        .bind(&shipment.raw_response)
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, user_id, payment_type, amount, currency,
                                  payment_status, gateway_order_id, gateway_transaction_id,
                                  raw_response, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.payment_type.as_str())
        .bind(payment.amount.amount())
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_transaction_id)
        .bind(&payment.raw_response)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Payment"))?;

        if let Some(invoice) = &aggregate.invoice {
            insert_invoice(&mut tx, invoice).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, order_code, subtotal, tax_price, shipping_charge,
                                coupon_id, coupon_code, coupon_discount, grand_total,
                                payment_type, delivery_status, payment_id, shipment_id,
                                invoice_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(&order.order_code)
        .bind(order.subtotal.amount())
        .bind(order.tax_price.amount())
        .bind(order.shipping_charge.amount())
        .bind(order.coupon_id.map(|id| id.as_uuid()))
        .bind(&order.coupon_code)
        .bind(order.coupon_discount.amount())
        .bind(order.grand_total.amount())
        .bind(order.payment_type.as_str())
        .bind(order.delivery_status.as_str())
        .bind(order.payment_id.as_uuid())
        .bind(order.shipment_id.as_uuid())
        .bind(order.invoice_id.map(|id| id.as_uuid()))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Order"))?;

        for (position, item) in aggregate.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_id, variation_id,
                                         quantity, unit_price, total, tax)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(item.variation_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.amount())
            .bind(item.total.amount())
            .bind(item.tax.amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderAggregate>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_by_id(&mut conn, order_id).await
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderAggregate>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_one(&mut conn, "p.gateway_order_id = $1", gateway_order_id).await
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic filter
        if query.user_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND o.user_id = ${param_count}"));
        }
        if query.order_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND o.id = ${param_count}"));
        }
        if query.order_code_contains.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND strpos(o.order_code, ${param_count}) > 0"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders o{filter}");
        let page_sql = format!(
            "{AGGREGATE_SELECT}{filter} ORDER BY o.created_at DESC, o.order_code DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut page_query = sqlx::query(&page_sql);

        if let Some(user_id) = query.user_id {
            count_query = count_query.bind(user_id.as_uuid());
            page_query = page_query.bind(user_id.as_uuid());
        }
        if let Some(order_id) = query.order_id {
            count_query = count_query.bind(order_id.as_uuid());
            page_query = page_query.bind(order_id.as_uuid());
        }
        if let Some(ref fragment) = query.order_code_contains {
            count_query = count_query.bind(fragment.clone());
            page_query = page_query.bind(fragment.clone());
        }
        page_query = page_query
            .bind(query.limit as i64)
            .bind(query.offset as i64);

        let mut conn = self.pool.acquire().await?;
        let total = count_query.fetch_one(&mut *conn).await?;
        let rows = page_query.fetch_all(&mut *conn).await?;
        let orders = Self::load_aggregates(&mut conn, rows).await?;

        Ok(OrderPage {
            total: total.max(0) as u64,
            orders,
        })
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "DELETE FROM orders WHERE id = $1 RETURNING payment_id, shipment_id, invoice_id",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;

        // order_items rows go with the order via ON DELETE CASCADE
        let payment_id: Uuid = row.try_get("payment_id")?;
        let shipment_id: Uuid = row.try_get("shipment_id")?;
        let invoice_id: Option<Uuid> = row.try_get("invoice_id")?;

        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM shipments WHERE id = $1")
            .bind(shipment_id)
            .execute(&mut *tx)
            .await?;
        if let Some(invoice_id) = invoice_id {
            sqlx::query("DELETE FROM invoices WHERE id = $1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn transition_payment(
        &self,
        transition: PaymentTransition,
    ) -> Result<TransitionOutcome> {
        let expected: Vec<String> = transition
            .expected
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE payments
            SET payment_status = $2,
                gateway_transaction_id = COALESCE($3, gateway_transaction_id),
                raw_response = COALESCE($4, raw_response),
                updated_at = $5
            WHERE id = $1 AND payment_status = ANY($6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let updated = sqlx::query(&sql)
            .bind(transition.payment_id.as_uuid())
            .bind(transition.target.as_str())
            .bind(&transition.transaction_id)
            .bind(&transition.raw_response)
            .bind(transition.at)
            .bind(&expected)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = updated else {
            let current: Option<String> =
                sqlx::query_scalar("SELECT payment_status FROM payments WHERE id = $1")
                    .bind(transition.payment_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return match current {
                Some(status) => Ok(TransitionOutcome::Rejected {
                    current: status.parse()?,
                }),
                None => Err(StoreError::PaymentNotFound(transition.payment_id)),
            };
        };
        let payment = Self::row_to_payment(&row)?;

        // Cascades only move forward; terminal or later states are kept.
        if let Some(delivery) = transition.delivery_status {
            let allowed: Vec<&str> = DeliveryStatus::predecessors(delivery)
                .iter()
                .map(DeliveryStatus::as_str)
                .collect();
            sqlx::query(
                r#"
                UPDATE orders SET delivery_status = $2, updated_at = $3
                WHERE id = $1 AND delivery_status = ANY($4)
                "#,
            )
            .bind(payment.order_id.as_uuid())
            .bind(delivery.as_str())
            .bind(transition.at)
            .bind(&allowed)
            .execute(&mut *tx)
            .await?;
        }
        if let Some(shipping) = transition.shipping_status {
            let allowed: Vec<&str> = ShippingStatus::predecessors(shipping)
                .iter()
                .map(ShippingStatus::as_str)
                .collect();
            sqlx::query(
                r#"
                UPDATE shipments SET shipping_status = $2, updated_at = $3
                WHERE id = (SELECT shipment_id FROM orders WHERE id = $1)
                  AND shipping_status = ANY($4)
                "#,
            )
            .bind(payment.order_id.as_uuid())
            .bind(shipping.as_str())
            .bind(transition.at)
            .bind(&allowed)
            .execute(&mut *tx)
            .await?;
        }
        if let Some(log) = &transition.log {
            insert_log(&mut tx, log).await?;
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied(payment))
    }

    async fn append_payment_log(&self, log: PaymentLog) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_log(&mut conn, &log).await
    }

    async fn payment_logs(&self, order_id: OrderId) -> Result<Vec<PaymentLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, payment_id, gateway_order_id, gateway_payment_id, status,
                   request_payload, response_payload, created_at
            FROM payment_logs
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_log).collect()
    }

    async fn find_stale_payments(&self, query: StalePaymentQuery) -> Result<Vec<Payment>> {
        let statuses: Vec<String> = query
            .statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.order_id, p.user_id, p.payment_type, p.amount, p.currency,
                   p.payment_status, p.gateway_order_id, p.gateway_transaction_id,
                   p.raw_response, p.created_at, p.updated_at
            FROM payments p
            JOIN orders o ON o.payment_id = p.id
            WHERE p.payment_type = $1
              AND p.payment_status = ANY($2)
              AND ($3::timestamptz IS NULL OR o.created_at > $3)
              AND ($4::timestamptz IS NULL OR o.created_at <= $4)
            ORDER BY o.created_at ASC
            "#,
        )
        .bind(query.payment_type.as_str())
        .bind(&statuses)
        .bind(query.created_after)
        .bind(query.created_at_or_before)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    async fn update_fulfillment(
        &self,
        order_id: OrderId,
        update: FulfillmentUpdate,
    ) -> Result<OrderAggregate> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent admin updates of the same order
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::OrderNotFound(order_id));
        }

        let mut aggregate = Self::load_by_id(&mut tx, order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let attached = aggregate.apply_fulfillment(&update)?;
        if attached && let Some(invoice) = &aggregate.invoice {
            insert_invoice(&mut tx, invoice).await?;
        }

        sqlx::query(
            "UPDATE orders SET delivery_status = $2, invoice_id = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .bind(aggregate.order.delivery_status.as_str())
        .bind(aggregate.order.invoice_id.map(|id| id.as_uuid()))
        .bind(aggregate.order.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE shipments SET shipping_status = $2, updated_at = $3 WHERE id = $1")
            .bind(aggregate.shipment.id.as_uuid())
            .bind(aggregate.shipment.status.as_str())
            .bind(aggregate.shipment.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(aggregate)
    }
}
