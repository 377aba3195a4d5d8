use crate::handlers::common::{created_response, map_service_error, no_content_response, success_response};
use crate::{
    auth::CurrentUser,
    errors::ApiError,
    services::orders::CreateOrderInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Order routes; all require authentication.
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(order_history))
        .route("/:id", get(get_order))
        .route("/:id/confirm-payment", post(confirm_payment))
        .route("/:id/cancel", post(cancel_order))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateOrderInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let placed = state
        .services
        .orders
        .create_order(user.id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(placed))
}

async fn order_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .order_history(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(user.id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct ConfirmPaymentRequest {
    payment_intent_id: String,
}

async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .confirm_payment(user.id, id, &payload.payment_intent_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Payment confirmed successfully.",
        "order": order,
    })))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .orders
        .cancel_order(user.id, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
