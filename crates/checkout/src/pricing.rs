//! Cart pricing against the live catalog.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use domain::{CartLine, Coupon, CouponError, PriceBreakdown, PricedLine, PricingPolicy};
use serde::Serialize;

use crate::clock::{Clock, business_day};
use crate::error::{CheckoutError, Result};
use crate::services::{CatalogService, CouponDirectory};

/// A cart priced at current catalog prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub breakdown: PriceBreakdown,
    /// The coupon that was applied, if any.
    pub coupon: Option<Coupon>,
}

/// Prices carts and validates coupons.
#[derive(Clone)]
pub struct PricingEngine {
    catalog: Arc<dyn CatalogService>,
    coupons: Arc<dyn CouponDirectory>,
    clock: Arc<dyn Clock>,
    policy: PricingPolicy,
    business_offset: FixedOffset,
}

impl PricingEngine {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        coupons: Arc<dyn CouponDirectory>,
        clock: Arc<dyn Clock>,
        policy: PricingPolicy,
        business_offset: FixedOffset,
    ) -> Self {
        Self {
            catalog,
            coupons,
            clock,
            policy,
            business_offset,
        }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    fn today(&self) -> NaiveDate {
        business_day(self.clock.now(), self.business_offset)
    }

    /// Resolves every cart line to its current sell price.
    ///
    /// Line numbers in errors are 1-based.
    pub async fn resolve_lines(&self, cart: &[CartLine]) -> Result<Vec<PricedLine>> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(cart.len());
        for (index, line) in cart.iter().enumerate() {
            let invalid = |reason: &str| CheckoutError::InvalidCartLine {
                line: index + 1,
                variation_id: line.variation_id.to_string(),
                reason: reason.to_string(),
            };

            if line.quantity == 0 {
                return Err(invalid("quantity must be positive"));
            }

            let price = self
                .catalog
                .variation_price(&line.variation_id)
                .await?
                .ok_or_else(|| invalid("variation is no longer available"))?;

            if price.product_id != line.product_id {
                return Err(invalid("variation does not belong to product"));
            }

            lines.push(PricedLine {
                product_id: line.product_id.clone(),
                variation_id: line.variation_id.clone(),
                quantity: line.quantity,
                unit_price: price.sell_price,
            });
        }
        Ok(lines)
    }

    /// Prices a cart. An unusable coupon is ignored rather than rejected.
    #[tracing::instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn price_cart(&self, cart: &[CartLine], coupon_code: Option<&str>) -> Result<PricedCart> {
        let lines = self.resolve_lines(cart).await?;

        let coupon = match coupon_code {
            Some(code) => self.redeemable_coupon(code).await?,
            None => None,
        };

        let breakdown = self
            .policy
            .price(&lines, coupon.as_ref().map(|coupon| coupon.value));

        Ok(PricedCart {
            lines,
            breakdown,
            coupon,
        })
    }

    async fn redeemable_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let today = self.today();
        let coupon = self.coupons.find_by_code(code).await?;
        match coupon {
            Some(coupon) if coupon.is_redeemable(today) => Ok(Some(coupon)),
            _ => {
                tracing::debug!(code, "Ignoring unusable coupon");
                Ok(None)
            }
        }
    }

    /// Strictly validates a coupon for today.
    pub async fn validate_coupon(&self, code: &str) -> Result<Coupon> {
        let coupon = self
            .coupons
            .find_by_code(code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.to_string()))?;
        coupon.check(self.today())?;
        Ok(coupon)
    }

    /// Coupons redeemable today.
    pub async fn active_coupons(&self) -> Result<Vec<Coupon>> {
        let today = self.today();
        let coupons = self.coupons.all_coupons().await?;
        Ok(coupons
            .into_iter()
            .filter(|coupon| coupon.is_redeemable(today))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use domain::Money;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::offset_from_minutes;
    use crate::services::{InMemoryCatalogService, InMemoryCouponDirectory, VariationPrice};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> (PricingEngine, InMemoryCatalogService, InMemoryCouponDirectory) {
        let catalog = InMemoryCatalogService::new();
        let coupons = InMemoryCouponDirectory::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap());
        let engine = PricingEngine::new(
            Arc::new(catalog.clone()),
            Arc::new(coupons.clone()),
            Arc::new(clock),
            PricingPolicy::default(),
            offset_from_minutes(330),
        );
        (engine, catalog, coupons)
    }

    #[tokio::test]
    async fn test_price_without_coupon() {
        let (engine, catalog, _) = engine();
        catalog.add_variation("V-1", VariationPrice::at("P-1", Money::from_major(600), 10));

        let priced = engine
            .price_cart(&[CartLine::new("P-1", "V-1", 2)], None)
            .await
            .unwrap();

        assert_eq!(priced.breakdown.subtotal, Money::from_major(1200));
        assert_eq!(priced.breakdown.tax, "216.00".parse().unwrap());
        assert_eq!(priced.breakdown.shipping_charge, Money::ZERO);
        assert_eq!(priced.breakdown.grand_total, "1200.00".parse().unwrap());
    }

    #[tokio::test]
    async fn test_price_with_active_coupon() {
        let (engine, catalog, coupons) = engine();
        catalog.add_variation("V-1", VariationPrice::at("P-1", Money::from_major(250), 10));
        coupons.add_coupon(Coupon::new("SAVE50", Money::from_major(50)));

        let priced = engine
            .price_cart(&[CartLine::new("P-1", "V-1", 2)], Some("SAVE50"))
            .await
            .unwrap();

        assert_eq!(priced.breakdown.subtotal, Money::from_major(500));
        assert_eq!(priced.breakdown.shipping_charge, Money::from_major(80));
        assert_eq!(priced.breakdown.discount, Money::from_major(50));
        assert_eq!(priced.breakdown.grand_total, "530.00".parse().unwrap());
        assert_eq!(priced.coupon.unwrap().code, "SAVE50");
    }

    #[tokio::test]
    async fn test_expired_coupon_is_silently_ignored() {
        let (engine, catalog, coupons) = engine();
        catalog.add_variation("V-1", VariationPrice::at("P-1", Money::from_major(250), 10));
        coupons.add_coupon(
            Coupon::new("OLD", Money::from_major(50))
                .valid_between(None, Some(date(2026, 10, 17))),
        );

        let priced = engine
            .price_cart(&[CartLine::new("P-1", "V-1", 2)], Some("OLD"))
            .await
            .unwrap();

        assert_eq!(priced.breakdown.discount, Money::ZERO);
        assert!(priced.coupon.is_none());
        assert_eq!(priced.breakdown.grand_total, Money::from_major(580));
    }

    #[tokio::test]
    async fn test_uses_current_sell_price() {
        let (engine, catalog, _) = engine();
        catalog.add_variation(
            "V-1",
            VariationPrice {
                product_id: "P-1".into(),
                regular_price: Money::from_major(300),
                sell_price: Money::from_major(270),
                stock: 3,
            },
        );

        let priced = engine
            .price_cart(&[CartLine::new("P-1", "V-1", 1)], None)
            .await
            .unwrap();
        assert_eq!(priced.lines[0].unit_price, Money::from_major(270));
    }

    #[tokio::test]
    async fn test_invalid_lines() {
        let (engine, catalog, _) = engine();
        catalog.add_variation("V-1", VariationPrice::at("P-1", Money::from_major(100), 1));

        let empty = engine.price_cart(&[], None).await;
        assert!(matches!(empty, Err(CheckoutError::EmptyCart)));

        let zero = engine
            .price_cart(&[CartLine::new("P-1", "V-1", 0)], None)
            .await;
        assert!(matches!(zero, Err(CheckoutError::InvalidCartLine { line: 1, .. })));

        let unknown = engine
            .price_cart(
                &[CartLine::new("P-1", "V-1", 1), CartLine::new("P-2", "V-9", 1)],
                None,
            )
            .await;
        assert!(matches!(
            unknown,
            Err(CheckoutError::InvalidCartLine { line: 2, ref variation_id, .. }) if variation_id == "V-9"
        ));

        let mismatched = engine
            .price_cart(&[CartLine::new("P-2", "V-1", 1)], None)
            .await;
        assert!(matches!(mismatched, Err(CheckoutError::InvalidCartLine { line: 1, .. })));
    }

    #[tokio::test]
    async fn test_validate_coupon_is_strict() {
        let (engine, _, coupons) = engine();
        coupons.add_coupon(Coupon::new("OFF", Money::from_major(10)).deactivated());
        coupons.add_coupon(
            Coupon::new("SOON", Money::from_major(10)).valid_between(Some(date(2026, 11, 1)), None),
        );
        coupons.add_coupon(Coupon::new("NOW", Money::from_major(10)));

        assert!(matches!(
            engine.validate_coupon("MISSING").await,
            Err(CheckoutError::InvalidCoupon(CouponError::NotFound(_)))
        ));
        assert!(matches!(
            engine.validate_coupon("OFF").await,
            Err(CheckoutError::InvalidCoupon(CouponError::Inactive(_)))
        ));
        assert!(matches!(
            engine.validate_coupon("SOON").await,
            Err(CheckoutError::InvalidCoupon(CouponError::NotStarted { .. }))
        ));
        assert_eq!(engine.validate_coupon("NOW").await.unwrap().code, "NOW");

        let active: Vec<_> = engine
            .active_coupons()
            .await
            .unwrap()
            .into_iter()
            .map(|coupon| coupon.code)
            .collect();
        assert_eq!(active, vec!["NOW"]);
    }
}
