//! Coupon directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::Coupon;

use crate::error::{CheckoutError, Result};

/// Read access to discount coupons.
#[async_trait]
pub trait CouponDirectory: Send + Sync {
    /// Looks up a coupon by its exact code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>>;

    async fn all_coupons(&self) -> Result<Vec<Coupon>>;
}

#[derive(Debug, Default)]
struct InMemoryCouponState {
    coupons: HashMap<String, Coupon>,
    fail_on_lookup: bool,
}

/// In-memory coupon directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCouponDirectory {
    state: Arc<RwLock<InMemoryCouponState>>,
}

impl InMemoryCouponDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a coupon, keyed by code.
    pub fn add_coupon(&self, coupon: Coupon) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .coupons
            .insert(coupon.code.clone(), coupon);
    }

    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_lookup = fail;
    }
}

#[async_trait]
impl CouponDirectory for InMemoryCouponDirectory {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_lookup {
            return Err(CheckoutError::collaborator("coupons", "Coupon store unavailable"));
        }

        Ok(state.coupons.get(code).cloned())
    }

    async fn all_coupons(&self) -> Result<Vec<Coupon>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_lookup {
            return Err(CheckoutError::collaborator("coupons", "Coupon store unavailable"));
        }

        let mut coupons: Vec<_> = state.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(coupons)
    }
}
