//! Gateway callback reconciliation.

use std::sync::Arc;

use common::UserId;
use domain::{
    DeliveryStatus, OrderAggregate, Payment, PaymentLog, PaymentLogStatus, PaymentStatus,
    PaymentTransition, ShippingStatus, TransitionOutcome,
};
use store::{CommerceStore, StoreError};

use crate::clock::Clock;
use crate::error::{CheckoutError, Result};
use crate::services::PaymentGateway;

/// Result of a reconciliation request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The payment moved to the requested terminal status.
    Applied(Payment),
    /// The payment was already terminal; nothing changed.
    AlreadyFinal(Payment),
}

impl ReconcileOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            ReconcileOutcome::Applied(payment) | ReconcileOutcome::AlreadyFinal(payment) => payment,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}

/// Applies gateway callbacks and user cancellations to payments.
///
/// Every attempt leaves one payment log row. Writes are conditional on the
/// payment still being open, so duplicate or late callbacks are no-ops.
pub struct PaymentReconciler<S> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl<S> PaymentReconciler<S>
where
    S: CommerceStore,
{
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            gateway,
            clock,
        }
    }

    /// Verifies and applies a payment-success callback.
    #[tracing::instrument(skip(self, signature, raw_payload))]
    pub async fn verify_callback(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
        raw_payload: serde_json::Value,
    ) -> Result<ReconcileOutcome> {
        let now = self.clock.now();

        if !self
            .gateway
            .verify_signature(gateway_order_id, gateway_payment_id, signature)
        {
            self.store
                .append_payment_log(
                    PaymentLog::new(PaymentLogStatus::SignatureError, now)
                        .with_gateway_ids(gateway_order_id, Some(gateway_payment_id.to_string()))
                        .with_request(raw_payload)
                        .with_response("signature mismatch"),
                )
                .await?;
            record_callback("signature_error");
            tracing::warn!("Rejected callback with bad signature");
            return Err(CheckoutError::SignatureMismatch(gateway_order_id.to_string()));
        }

        let payment = self
            .find_payment(gateway_order_id, Some(gateway_payment_id), &raw_payload)
            .await?;

        if payment.is_terminal() {
            return self
                .already_final(payment, Some(gateway_payment_id), raw_payload)
                .await;
        }

        let transition = PaymentTransition::to(payment.id, PaymentStatus::Success, now)
            .with_transaction_id(gateway_payment_id)
            .with_raw_response(raw_payload.clone())
            .cascade_delivery(DeliveryStatus::Confirmed)
            .with_log(
                PaymentLog::new(PaymentLogStatus::Success, now)
                    .for_payment(&payment)
                    .with_gateway_ids(gateway_order_id, Some(gateway_payment_id.to_string()))
                    .with_request(raw_payload.clone()),
            );

        self.apply(
            gateway_order_id,
            transition,
            Some(gateway_payment_id),
            raw_payload,
            "success",
        )
        .await
    }

    /// Cancels an open payment at the user's request.
    ///
    /// With `user_id` set, payments of other users are reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(
        &self,
        gateway_order_id: &str,
        user_id: Option<UserId>,
    ) -> Result<ReconcileOutcome> {
        let now = self.clock.now();
        let request = serde_json::json!({ "gateway_order_id": gateway_order_id });

        let payment = self.find_payment(gateway_order_id, None, &request).await?;
        if user_id.is_some_and(|user_id| user_id != payment.user_id) {
            return Err(CheckoutError::PaymentNotFound(gateway_order_id.to_string()));
        }

        if payment.is_terminal() {
            return self.already_final(payment, None, request).await;
        }

        let transition = PaymentTransition::to(payment.id, PaymentStatus::Cancelled, now)
            .cascade_delivery(DeliveryStatus::Cancelled)
            .cascade_shipping(ShippingStatus::Cancelled)
            .with_log(
                PaymentLog::new(PaymentLogStatus::Cancelled, now)
                    .for_payment(&payment)
                    .with_request(request.clone()),
            );

        self.apply(gateway_order_id, transition, None, request, "cancelled")
            .await
    }

    async fn find_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: Option<&str>,
        request: &serde_json::Value,
    ) -> Result<Payment> {
        match self.store.find_by_gateway_order_id(gateway_order_id).await? {
            Some(OrderAggregate { payment, .. }) => Ok(payment),
            None => {
                self.store
                    .append_payment_log(
                        PaymentLog::new(PaymentLogStatus::NotFound, self.clock.now())
                            .with_gateway_ids(
                                gateway_order_id,
                                gateway_payment_id.map(str::to_string),
                            )
                            .with_request(request.clone()),
                    )
                    .await?;
                record_callback("not_found");
                tracing::warn!("No payment for gateway order");
                Err(CheckoutError::PaymentNotFound(gateway_order_id.to_string()))
            }
        }
    }

    async fn apply(
        &self,
        gateway_order_id: &str,
        transition: PaymentTransition,
        gateway_payment_id: Option<&str>,
        request: serde_json::Value,
        outcome: &'static str,
    ) -> Result<ReconcileOutcome> {
        let payment_id = transition.payment_id;
        match self.store.transition_payment(transition).await? {
            TransitionOutcome::Applied(payment) => {
                record_callback(outcome);
                tracing::info!(status = %payment.status, "Payment reconciled");
                Ok(ReconcileOutcome::Applied(payment))
            }
            TransitionOutcome::Rejected { current } => {
                tracing::info!(%current, "Lost race against another writer");
                let payment = self
                    .store
                    .find_by_gateway_order_id(gateway_order_id)
                    .await?
                    .map(|aggregate| aggregate.payment)
                    .ok_or(StoreError::PaymentNotFound(payment_id))?;
                self.already_final(payment, gateway_payment_id, request)
                    .await
            }
        }
    }

    async fn already_final(
        &self,
        payment: Payment,
        gateway_payment_id: Option<&str>,
        request: serde_json::Value,
    ) -> Result<ReconcileOutcome> {
        let mut log = PaymentLog::new(PaymentLogStatus::Duplicate, self.clock.now())
            .for_payment(&payment)
            .with_request(request)
            .with_response(format!("payment already {}", payment.status));
        log.gateway_payment_id = gateway_payment_id.map(str::to_string);
        self.store.append_payment_log(log).await?;

        record_callback("duplicate");
        tracing::info!(status = %payment.status, "Payment already final");
        Ok(ReconcileOutcome::AlreadyFinal(payment))
    }
}

fn record_callback(outcome: &'static str) {
    metrics::counter!("payment_callbacks_total", "outcome" => outcome).increment(1);
}
