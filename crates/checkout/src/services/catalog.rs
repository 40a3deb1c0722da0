//! Catalog lookup trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{Money, ProductId, VariationId};
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};

/// Current price and stock of one product variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationPrice {
    pub product_id: ProductId,
    pub regular_price: Money,
    pub sell_price: Money,
    /// Informational; placement does not reserve stock.
    pub stock: u32,
}

impl VariationPrice {
    /// A variation selling at its regular price.
    pub fn at(product_id: impl Into<ProductId>, price: Money, stock: u32) -> Self {
        Self {
            product_id: product_id.into(),
            regular_price: price,
            sell_price: price,
            stock,
        }
    }
}

/// Read access to the product catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns the current price of a variation, if it still exists.
    async fn variation_price(&self, variation_id: &VariationId) -> Result<Option<VariationPrice>>;

    /// Returns true if the product exists.
    async fn product_exists(&self, product_id: &ProductId) -> Result<bool>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    variations: HashMap<VariationId, VariationPrice>,
    fail_on_lookup: bool,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a variation.
    pub fn add_variation(&self, variation_id: impl Into<VariationId>, price: VariationPrice) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .variations
            .insert(variation_id.into(), price);
    }

    /// Removes a variation, as if it was deleted from the catalog.
    pub fn remove_variation(&self, variation_id: &VariationId) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .variations
            .remove(variation_id);
    }

    /// Configures the service to fail on lookups.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_lookup = fail;
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn variation_price(&self, variation_id: &VariationId) -> Result<Option<VariationPrice>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_lookup {
            return Err(CheckoutError::collaborator("catalog", "Catalog unavailable"));
        }

        Ok(state.variations.get(variation_id).cloned())
    }

    async fn product_exists(&self, product_id: &ProductId) -> Result<bool> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_lookup {
            return Err(CheckoutError::collaborator("catalog", "Catalog unavailable"));
        }

        Ok(state
            .variations
            .values()
            .any(|variation| &variation.product_id == product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_remove() {
        let catalog = InMemoryCatalogService::new();
        catalog.add_variation("V-1", VariationPrice::at("P-1", Money::from_major(250), 5));

        let price = catalog
            .variation_price(&VariationId::new("V-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(price.sell_price, Money::from_major(250));
        assert!(catalog.product_exists(&ProductId::new("P-1")).await.unwrap());

        catalog.remove_variation(&VariationId::new("V-1"));
        assert!(
            catalog
                .variation_price(&VariationId::new("V-1"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(!catalog.product_exists(&ProductId::new("P-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_on_lookup() {
        let catalog = InMemoryCatalogService::new();
        catalog.set_fail_on_lookup(true);
        let result = catalog.variation_price(&VariationId::new("V-1")).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Collaborator { service: "catalog", .. })
        ));
    }
}
