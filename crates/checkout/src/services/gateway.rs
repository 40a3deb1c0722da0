//! Payment gateway trait, an in-memory fake and the Razorpay client.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CheckoutError, Result};
use crate::signature;

/// A provider-side reservation of an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIntent {
    /// Provider id, later echoed back in callbacks as the gateway order id.
    pub id: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Operations against the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Reserves `amount` at the provider and returns the intent.
    async fn create_intent(&self, amount: Money, currency: &str, receipt: &str)
    -> Result<GatewayIntent>;

    /// Checks a callback signature against the shared secret.
    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str)
    -> bool;
}

fn minor_units(amount: Money) -> Result<i64> {
    amount
        .to_minor_units()
        .ok_or_else(|| CheckoutError::GatewayUnavailable(format!("amount {amount} out of range")))
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    intents: Vec<GatewayIntent>,
    fail_on_create: bool,
}

/// In-memory gateway for testing. Signs and verifies with a local secret.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    secret: String,
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            state: Arc::default(),
        }
    }

    /// Signs a callback the way the provider would.
    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        signature::sign(&self.secret, gateway_order_id, gateway_payment_id)
    }

    /// Configures the gateway to refuse new intents.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    /// Returns the number of intents created so far.
    pub fn intent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayIntent> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(CheckoutError::GatewayUnavailable(
                "Gateway timed out".to_string(),
            ));
        }

        let intent = GatewayIntent {
            id: format!("order_TEST{:010}", state.intents.len() + 1),
            amount: minor_units(amount)?,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };
        state.intents.push(intent.clone());
        Ok(intent)
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        signature::verify(&self.secret, gateway_order_id, gateway_payment_id, signature)
    }
}

/// Connection settings for the Razorpay Orders API.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            key_secret: String::new(),
            base_url: "https://api.razorpay.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
}

/// Payment gateway backed by the Razorpay Orders API.
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl RazorpayGateway {
    /// Builds a client whose requests give up after `config.timeout`.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[tracing::instrument(skip(self))]
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayIntent> {
        let url = format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "amount": minor_units(amount)?,
            "currency": currency,
            "receipt": receipt,
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "Gateway rejected intent");
            return Err(CheckoutError::GatewayUnavailable(format!(
                "gateway returned {status}"
            )));
        }

        let order: RazorpayOrder = response
            .json()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        Ok(GatewayIntent {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
            receipt: order.receipt.unwrap_or_else(|| receipt.to_string()),
        })
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        signature::verify(
            &self.config.key_secret,
            gateway_order_id,
            gateway_payment_id,
            signature,
        )
    }
}
