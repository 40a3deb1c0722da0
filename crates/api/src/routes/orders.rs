//! Customer order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use checkout::{CreateOrder, OrderResult};
use common::AddressId;
use domain::{CartLine, OrderAggregate, PaymentType};
use serde::{Deserialize, Serialize};
use store::{CommerceStore, DEFAULT_PAGE_SIZE, OrderPage, OrderQuery};

use super::{AppState, CurrentUser, parse_order_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    /// Explicit cart; when absent the caller's saved cart is used.
    #[serde(default)]
    pub items: Option<Vec<CartLine>>,
    pub shipping_address_id: AddressId,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Substring of the order code.
    pub order_code: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPageResponse {
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub orders: Vec<OrderAggregate>,
}

impl OrderPageResponse {
    pub(crate) fn new(page: OrderPage, query: &OrderQuery) -> Self {
        Self {
            total: page.total,
            limit: query.limit,
            offset: query.offset,
            orders: page.orders,
        }
    }
}

impl ListParams {
    pub(crate) fn apply(&self, mut query: OrderQuery) -> OrderQuery {
        query = query
            .limit(self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
            .offset(self.offset.unwrap_or(0));
        if let Some(fragment) = &self.order_code {
            query = query.order_code_contains(fragment.clone());
        }
        query
    }
}

// -- Handlers --

/// POST /orders: place an order for the caller.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn create<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResult>), ApiError> {
    let placed = match req.items {
        Some(cart) => {
            state
                .workflow
                .create_order(CreateOrder {
                    user_id: user.0,
                    cart,
                    shipping_address_id: req.shipping_address_id,
                    payment_type: req.payment_type,
                    coupon_code: req.coupon_code,
                })
                .await?
        }
        None => {
            state
                .workflow
                .place_order_from_cart(
                    user.0,
                    req.shipping_address_id,
                    req.payment_type,
                    req.coupon_code,
                )
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /orders: list the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<OrderPageResponse>, ApiError> {
    let query = params.apply(OrderQuery::for_user(user.0));
    let page = state.fulfillment.list_orders(query.clone()).await?;
    Ok(Json(OrderPageResponse::new(page, &query)))
}

/// GET /orders/{id}: one of the caller's orders with payment, shipment,
/// items and invoice.
#[tracing::instrument(skip(state))]
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderAggregate>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let aggregate = state
        .fulfillment
        .get_order_for_user(order_id, user.0)
        .await?;
    Ok(Json(aggregate))
}
