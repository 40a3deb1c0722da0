//! Administrative endpoints: order management, audit trail and sweeps.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use checkout::{StatusUpdate, SweepReport};
use common::{OrderId, UserId};
use domain::{OrderAggregate, PaymentLog};
use serde::Deserialize;
use store::{CommerceStore, OrderQuery};

use super::orders::{ListParams, OrderPageResponse};
use super::{AppState, parse_order_id};
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    pub user_id: Option<UserId>,
    pub order_id: Option<OrderId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_code: Option<String>,
}

/// GET /admin/orders: list all orders with optional filters.
#[tracing::instrument(skip(state))]
pub async fn list<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<AdminListParams>,
) -> Result<Json<OrderPageResponse>, ApiError> {
    let page = ListParams {
        limit: params.limit,
        offset: params.offset,
        order_code: params.order_code,
    };
    let mut query = page.apply(OrderQuery::new());
    if let Some(user_id) = params.user_id {
        query = query.user_id(user_id);
    }
    if let Some(order_id) = params.order_id {
        query = query.order_id(order_id);
    }

    let page = state.fulfillment.list_orders(query.clone()).await?;
    Ok(Json(OrderPageResponse::new(page, &query)))
}

/// PATCH /admin/orders/{id}/status: move shipping and/or delivery status.
#[tracing::instrument(skip(state))]
pub async fn update_status<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<OrderAggregate>, ApiError> {
    let order_id = parse_order_id(&id)?;
    if update.shipping_status.is_none() && update.delivery_status.is_none() {
        return Err(ApiError::BadRequest(
            "Provide shipping_status or delivery_status".to_string(),
        ));
    }

    let aggregate = state.fulfillment.update_status(order_id, update).await?;
    Ok(Json(aggregate))
}

/// DELETE /admin/orders/{id}: delete an order and everything it owns.
#[tracing::instrument(skip(state))]
pub async fn delete<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id = parse_order_id(&id)?;
    state.fulfillment.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/orders/{id}/payment-logs: reconciliation audit trail.
#[tracing::instrument(skip(state))]
pub async fn payment_logs<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PaymentLog>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.fulfillment.payment_logs(order_id).await?))
}

/// POST /admin/payments/sweep: run the timeout sweeper now.
#[tracing::instrument(skip(state))]
pub async fn sweep<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.sweeper.sweep_once(state.clock.now()).await?;
    Ok(Json(report))
}
