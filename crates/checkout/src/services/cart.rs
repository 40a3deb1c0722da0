//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::UserId;
use domain::CartLine;

use crate::error::{CheckoutError, Result};

/// Read access to customers' carts.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Returns the current lines of a user's cart.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartLine>>,
    fail_on_read: bool,
}

/// In-memory cart service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    /// Creates a new in-memory cart service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a user's cart.
    pub fn set_cart(&self, user_id: UserId, lines: Vec<CartLine>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .carts
            .insert(user_id, lines);
    }

    /// Configures the service to fail on reads.
    pub fn set_fail_on_read(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_read = fail;
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_read {
            return Err(CheckoutError::collaborator("cart", "Cart store unavailable"));
        }

        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }
}
