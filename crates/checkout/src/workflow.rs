//! The create-order transaction.

use std::sync::Arc;
use std::time::Instant;

use common::{AddressId, OrderId, UserId};
use domain::{CartLine, Money, OrderAggregate, OrderDraft, PaymentType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use crate::clock::Clock;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::pricing::{PricedCart, PricingEngine};
use crate::sequence::SequenceGenerator;
use crate::services::Collaborators;

/// Input of [`OrderWorkflow::create_order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub user_id: UserId,
    pub cart: Vec<CartLine>,
    pub shipping_address_id: AddressId,
    pub payment_type: PaymentType,
    pub coupon_code: Option<String>,
}

/// What the client needs to pay for a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub order_code: String,
    pub grand_total: Money,
    pub currency: String,
    /// Gateway intent id, present for prepaid orders.
    pub gateway_order_id: Option<String>,
}

impl OrderResult {
    fn from_aggregate(aggregate: &OrderAggregate) -> Self {
        Self {
            order_id: aggregate.id(),
            order_code: aggregate.order.order_code.clone(),
            grand_total: aggregate.order.grand_total,
            currency: aggregate.payment.currency.clone(),
            gateway_order_id: aggregate.payment.gateway_order_id.clone(),
        }
    }
}

/// Turns carts into persisted orders.
///
/// The gateway intent is requested before anything is written and outside
/// any transaction. The only transaction is the final insert of the whole
/// aggregate, so a failure at any step leaves no local rows behind.
pub struct OrderWorkflow<S> {
    store: S,
    sequences: SequenceGenerator<S>,
    pricing: PricingEngine,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    config: CheckoutConfig,
}

impl<S> OrderWorkflow<S>
where
    S: CommerceStore + Clone,
{
    pub fn new(
        store: S,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        config: CheckoutConfig,
    ) -> Self {
        let sequences = SequenceGenerator::new(store.clone(), Arc::clone(&clock), config.clone());
        let pricing = PricingEngine::new(
            Arc::clone(&collaborators.catalog),
            Arc::clone(&collaborators.coupons),
            Arc::clone(&clock),
            config.pricing,
            config.business_offset,
        );
        Self {
            store,
            sequences,
            pricing,
            collaborators,
            clock,
            config,
        }
    }

    /// The pricing engine used for new orders.
    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    /// Places an order from an explicit cart.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, payment_type = %request.payment_type)
    )]
    pub async fn create_order(&self, request: CreateOrder) -> Result<OrderResult> {
        let started = Instant::now();
        let payment_type = request.payment_type;

        let result = self.place(request).await;

        match &result {
            Ok(placed) => {
                metrics::counter!("orders_created_total", "payment_type" => payment_type.as_str())
                    .increment(1);
                metrics::histogram!("order_creation_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_code = %placed.order_code,
                    grand_total = %placed.grand_total,
                    "Order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_creation_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %e, "Order placement failed");
            }
        }

        result
    }

    /// Places an order from the user's current cart.
    pub async fn place_order_from_cart(
        &self,
        user_id: UserId,
        shipping_address_id: AddressId,
        payment_type: PaymentType,
        coupon_code: Option<String>,
    ) -> Result<OrderResult> {
        let cart = self.collaborators.cart.cart_lines(user_id).await?;
        self.create_order(CreateOrder {
            user_id,
            cart,
            shipping_address_id,
            payment_type,
            coupon_code,
        })
        .await
    }

    async fn place(&self, request: CreateOrder) -> Result<OrderResult> {
        let address_id = request.shipping_address_id;
        self.collaborators
            .addresses
            .get_address(address_id)
            .await?
            .filter(|address| address.user_id == request.user_id)
            .ok_or(CheckoutError::AddressNotFound(address_id))?;

        let priced = self
            .pricing
            .price_cart(&request.cart, request.coupon_code.as_deref())
            .await?;

        let gateway_order_id = match request.payment_type {
            PaymentType::Prepaid => {
                let receipt = format!("rcpt_{}", rand::thread_rng().gen_range(100_000..1_000_000));
                let intent = self
                    .collaborators
                    .gateway
                    .create_intent(priced.breakdown.grand_total, &self.config.currency, &receipt)
                    .await
                    .map_err(|e| match e {
                        CheckoutError::GatewayUnavailable(_) => e,
                        other => CheckoutError::GatewayUnavailable(other.to_string()),
                    })?;
                Some(intent.id)
            }
            PaymentType::Cod => None,
        };

        let aggregate = match self
            .persist(&request, priced, gateway_order_id.clone())
            .await
        {
            Ok(aggregate) => aggregate,
            Err(e) => {
                if let Some(intent) = &gateway_order_id {
                    tracing::warn!(
                        gateway_order_id = %intent,
                        error = %e,
                        "Gateway intent left unpaid after failed placement"
                    );
                }
                return Err(e);
            }
        };

        let notifier = Arc::clone(&self.collaborators.notifier);
        let confirmation = aggregate.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_order_confirmation(&confirmation).await {
                tracing::warn!(
                    order_code = %confirmation.order.order_code,
                    error = %e,
                    "Order confirmation not sent"
                );
            }
        });

        Ok(OrderResult::from_aggregate(&aggregate))
    }

    async fn persist(
        &self,
        request: &CreateOrder,
        priced: PricedCart,
        gateway_order_id: Option<String>,
    ) -> Result<OrderAggregate> {
        let order_code = self.sequences.next_order_code().await?;

        let draft = OrderDraft {
            user_id: request.user_id,
            order_code,
            address_id: request.shipping_address_id,
            payment_type: request.payment_type,
            currency: self.config.currency.clone(),
            gateway_order_id,
            lines: priced.lines,
            breakdown: priced.breakdown,
            coupon: priced.coupon.map(|coupon| (coupon.id, coupon.code)),
            placed_at: self.clock.now(),
        };
        let aggregate = OrderAggregate::place(draft, &self.config.pricing);

        self.store.insert_order(&aggregate).await?;
        Ok(aggregate)
    }
}
