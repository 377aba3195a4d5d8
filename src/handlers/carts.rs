use crate::handlers::common::{map_service_error, message_response, success_response};
use crate::{
    auth::CurrentUser,
    errors::ApiError,
    services::cart::{AddToCartInput, ClearOutcome, QuantityUpdate, RemoveOutcome},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Cart routes; all require authentication.
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(view_cart))
        .route("/", delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", put(set_quantity))
        .route("/items/:item_id", delete(remove_item))
}

async fn view_cart(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state
        .services
        .cart
        .view_cart(user.id)
        .await
        .map_err(map_service_error)?;

    if view.is_empty() {
        return Ok(message_response("Your cart is empty!"));
    }
    Ok(success_response(view))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let line = state
        .services
        .cart
        .add_item(user.id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Product added to cart",
        "item": line,
    })))
}

#[derive(Debug, Deserialize)]
struct SetQuantityRequest {
    quantity: i32,
}

async fn set_quantity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<SetQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .cart
        .set_item_quantity(user.id, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    match outcome {
        QuantityUpdate::Updated(line) => Ok(success_response(serde_json::json!({
            "message": "Quantity updated",
            "item": line,
        }))),
        QuantityUpdate::Removed => Ok(message_response("Item removed because quantity was 0")),
    }
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .cart
        .remove_item(user.id, item_id)
        .await
        .map_err(map_service_error)?;

    match outcome {
        RemoveOutcome::Removed => Ok(message_response("Item removed from cart")),
        RemoveOutcome::AlreadyAbsent => Ok(message_response("Item already removed")),
    }
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .cart
        .clear_cart(user.id)
        .await
        .map_err(map_service_error)?;

    match outcome {
        ClearOutcome::Cleared { .. } => Ok(message_response("Cart cleared successfully")),
        ClearOutcome::AlreadyEmpty => Ok(message_response("Cart is already empty!")),
    }
}
