use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{OrderAggregate, PaymentStatus, PaymentType};

/// Default page size for order listings.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Builder for order listings.
///
/// Results are ordered newest first and paged with `limit`/`offset`.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    /// Only orders owned by this user.
    pub user_id: Option<UserId>,

    /// Only orders whose code contains this substring.
    pub order_code_contains: Option<String>,

    /// Only the order with this id.
    pub order_id: Option<OrderId>,

    /// Maximum number of orders to return.
    pub limit: usize,

    /// Number of orders to skip.
    pub offset: usize,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            order_code_contains: None,
            order_id: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl OrderQuery {
    /// Creates a query over all orders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one user's orders.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Filters by owning user.
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Filters by order-code substring.
    pub fn order_code_contains(mut self, fragment: impl Into<String>) -> Self {
        self.order_code_contains = Some(fragment.into());
        self
    }

    /// Filters by order id.
    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of orders to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if the aggregate passes every filter.
    pub fn matches(&self, aggregate: &OrderAggregate) -> bool {
        if let Some(user_id) = self.user_id
            && aggregate.order.user_id != user_id
        {
            return false;
        }
        if let Some(order_id) = self.order_id
            && aggregate.order.id != order_id
        {
            return false;
        }
        if let Some(ref fragment) = self.order_code_contains
            && !aggregate.order.order_code.contains(fragment.as_str())
        {
            return false;
        }
        true
    }
}

/// One page of an order listing.
#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    /// Number of orders matching the filters, ignoring paging.
    pub total: u64,
    pub orders: Vec<OrderAggregate>,
}

/// Selects payments the timeout sweeper may act on.
#[derive(Debug, Clone)]
pub struct StalePaymentQuery {
    pub payment_type: PaymentType,

    /// Payments currently in any of these statuses.
    pub statuses: Vec<PaymentStatus>,

    /// Orders created strictly after this instant.
    pub created_after: Option<DateTime<Utc>>,

    /// Orders created at or before this instant.
    pub created_at_or_before: Option<DateTime<Utc>>,
}

impl StalePaymentQuery {
    /// Prepaid payments in `statuses`.
    pub fn prepaid(statuses: impl IntoIterator<Item = PaymentStatus>) -> Self {
        Self {
            payment_type: PaymentType::Prepaid,
            statuses: statuses.into_iter().collect(),
            created_after: None,
            created_at_or_before: None,
        }
    }

    /// Restricts to orders created strictly after `instant`.
    pub fn created_after(mut self, instant: DateTime<Utc>) -> Self {
        self.created_after = Some(instant);
        self
    }

    /// Restricts to orders created at or before `instant`.
    pub fn created_at_or_before(mut self, instant: DateTime<Utc>) -> Self {
        self.created_at_or_before = Some(instant);
        self
    }

    /// Returns true if the aggregate is selected by this query.
    pub fn matches(&self, aggregate: &OrderAggregate) -> bool {
        let created_at = aggregate.order.created_at;
        aggregate.payment.payment_type == self.payment_type
            && self.statuses.contains(&aggregate.payment.status)
            && self.created_after.is_none_or(|after| created_at > after)
            && self
                .created_at_or_before
                .is_none_or(|before| created_at <= before)
    }
}
