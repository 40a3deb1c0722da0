//! Coupon listing and validation.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::Coupon;
use serde::Deserialize;
use store::CommerceStore;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
}

/// GET /coupons: coupons redeemable today.
pub async fn list<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(state.workflow.pricing().active_coupons().await?))
}

/// POST /coupons/validate: strict check of one coupon.
#[tracing::instrument(skip(state, request), fields(code = %request.code))]
pub async fn validate<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<Coupon>, ApiError> {
    let coupon = state
        .workflow
        .pricing()
        .validate_coupon(request.code.trim())
        .await?;
    Ok(Json(coupon))
}
