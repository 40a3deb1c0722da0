//! Customer notifications.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::OrderAggregate;

use crate::error::{CheckoutError, Result};

/// Sends order emails or messages. Callers treat failures as non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(&self, order: &OrderAggregate) -> Result<()>;

    async fn send_status_update(&self, order: &OrderAggregate) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderConfirmation,
    StatusUpdate,
}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub order_id: OrderId,
    pub order_code: String,
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    fail_on_send: bool,
}

/// In-memory notifier that records what it would have sent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    fn record(&self, kind: NotificationKind, order: &OrderAggregate) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_send {
            return Err(CheckoutError::collaborator("notifier", "Mailer unavailable"));
        }

        state.sent.push(Notification {
            kind,
            order_id: order.id(),
            order_code: order.order.order_code.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send_order_confirmation(&self, order: &OrderAggregate) -> Result<()> {
        self.record(NotificationKind::OrderConfirmation, order)
    }

    async fn send_status_update(&self, order: &OrderAggregate) -> Result<()> {
        self.record(NotificationKind::StatusUpdate, order)
    }
}
