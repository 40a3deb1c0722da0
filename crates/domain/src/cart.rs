//! Catalog references and cart lines.

use serde::{Deserialize, Serialize};

/// Catalog product reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Catalog variation reference (a concrete size/colour of a product).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariationId(String);

impl VariationId {
    /// Creates a new variation ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the variation ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VariationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VariationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One line of a customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variation_id: VariationId,
    pub quantity: u32,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(
        product_id: impl Into<ProductId>,
        variation_id: impl Into<VariationId>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variation_id: variation_id.into(),
            quantity,
        }
    }
}
