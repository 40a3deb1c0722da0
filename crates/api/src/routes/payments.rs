//! Gateway callbacks and user cancellations.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::ReconcileOutcome;
use common::{OrderId, PaymentId};
use domain::PaymentStatus;
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use super::{AppState, CurrentUser};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub gateway_payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Deserialize)]
pub struct CancelPaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
}

#[derive(Serialize)]
pub struct PaymentOutcomeResponse {
    /// False when the payment was already final and nothing changed.
    pub applied: bool,
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub payment_status: PaymentStatus,
}

impl From<ReconcileOutcome> for PaymentOutcomeResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        let payment = outcome.payment();
        Self {
            applied: outcome.is_applied(),
            order_id: payment.order_id,
            payment_id: payment.id,
            payment_status: payment.status,
        }
    }
}

/// POST /payments/verify: apply a signed payment-success callback.
///
/// The whole request body is stored as the raw gateway payload.
#[tracing::instrument(skip(state, payload))]
pub async fn verify<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    let request: VerifyPaymentRequest = serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid callback: {e}")))?;

    let outcome = state
        .reconciler
        .verify_callback(
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.signature,
            payload,
        )
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /payments/cancel: cancel the caller's open payment.
#[tracing::instrument(skip(state, request), fields(user_id = %user.0))]
pub async fn cancel<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(request): Json<CancelPaymentRequest>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    let outcome = state
        .reconciler
        .cancel_payment(&request.gateway_order_id, Some(user.0))
        .await?;
    Ok(Json(outcome.into()))
}
