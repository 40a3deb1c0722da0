//! HTTP handlers and the state they share.

pub mod admin;
pub mod coupons;
pub mod ops;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use checkout::{
    CheckoutConfig, Clock, Collaborators, FulfillmentService, OrderWorkflow, PaymentReconciler,
    TimeoutSweeper,
};
use common::{OrderId, UserId};
use store::CommerceStore;

use crate::error::ApiError;

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub workflow: OrderWorkflow<S>,
    pub reconciler: PaymentReconciler<S>,
    pub sweeper: Arc<TimeoutSweeper<S>>,
    pub fulfillment: FulfillmentService<S>,
    pub clock: Arc<dyn Clock>,
    /// Name of the storage backend, reported by `/health`.
    pub backend: &'static str,
}

impl<S> AppState<S>
where
    S: CommerceStore + Clone + 'static,
{
    pub fn new(
        store: S,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        config: CheckoutConfig,
        backend: &'static str,
    ) -> Self {
        let workflow = OrderWorkflow::new(
            store.clone(),
            collaborators.clone(),
            Arc::clone(&clock),
            config.clone(),
        );
        let reconciler = PaymentReconciler::new(
            store.clone(),
            Arc::clone(&collaborators.gateway),
            Arc::clone(&clock),
        );
        let sweeper = Arc::new(TimeoutSweeper::new(
            store.clone(),
            Arc::clone(&clock),
            config.sweep,
        ));
        let fulfillment = FulfillmentService::new(
            store,
            Arc::clone(&collaborators.invoices),
            Arc::clone(&collaborators.notifier),
            Arc::clone(&clock),
            config,
        );

        Self {
            workflow,
            reconciler,
            sweeper,
            fulfillment,
            clock,
            backend,
        }
    }
}

/// The caller, identified by the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<St> FromRequestParts<St> for CurrentUser
where
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
        value
            .to_str()
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))
    }
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
