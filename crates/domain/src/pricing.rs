//! Order pricing arithmetic.
//!
//! Prices here are already resolved; fetching current catalog prices is the
//! job of the checkout layer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{ProductId, VariationId};
use crate::money::Money;

/// Business parameters for pricing a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Informational tax rate applied to the subtotal (e.g. `0.18`).
    pub tax_rate: Decimal,
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Money,
    /// Charge applied when the subtotal does not clear the threshold.
    pub flat_shipping_charge: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            free_shipping_threshold: Money::from_major(1000),
            flat_shipping_charge: Money::from_major(80),
        }
    }
}

/// A cart line with its unit price resolved at pricing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub variation_id: VariationId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl PricedLine {
    /// Returns `unit_price * quantity`.
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The computed money amounts of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_charge: Money,
    pub discount: Money,
    pub grand_total: Money,
}

impl PricingPolicy {
    /// Shipping charge for a subtotal.
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal > self.free_shipping_threshold {
            Money::ZERO
        } else {
            self.flat_shipping_charge
        }
    }

    /// Tax on an amount, rounded to two places.
    pub fn tax_on(&self, amount: Money) -> Money {
        amount.apply_rate(self.tax_rate)
    }

    /// Prices resolved lines with an optional, already validated coupon value.
    ///
    /// Tax is reported but not added to the grand total. The discount is
    /// capped so the grand total never drops below zero.
    pub fn price(&self, lines: &[PricedLine], coupon_value: Option<Money>) -> PriceBreakdown {
        let subtotal = lines.iter().map(PricedLine::total).sum::<Money>().round();
        let tax = self.tax_on(subtotal);
        let shipping_charge = self.shipping_for(subtotal);
        let discount = coupon_value
            .map(|value| value.round().max(Money::ZERO).min(subtotal + shipping_charge))
            .unwrap_or(Money::ZERO);
        let grand_total = (subtotal + shipping_charge - discount).round();

        PriceBreakdown {
            subtotal,
            tax,
            shipping_charge,
            discount,
            grand_total,
        }
    }
}
