use crate::handlers::common::{created_response, map_service_error, no_content_response, success_response};
use crate::{
    auth::CurrentUser,
    errors::ApiError,
    services::reviews::{CreateReportInput, CreateReviewInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated review/rating/report routes. Listing a product's reviews is
/// public and lives with the product routes.
pub fn reviews_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reviews/product/:id", post(create_review))
        .route("/ratings/product/:id", post(rate_product))
        .route("/reviews/:id", delete(delete_review))
        .route("/reviews/:id/replies", post(reply_to_review))
        .route("/reports", post(create_report))
        .route("/reports", get(list_reports))
}

/// Public handler mounted under the product routes.
pub async fn list_product_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, ApiError> {
    let reviews = state
        .services
        .reviews
        .list_reviews(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(reviews))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let review = state
        .services
        .reviews
        .create_review(user.id, id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(review))
}

#[derive(Debug, Deserialize)]
struct RateRequest {
    score: i32,
}

async fn rate_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rating = state
        .services
        .reviews
        .rate_product(user.id, id, payload.score)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(rating))
}

async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .reviews
        .delete_review(user.id, user.is_staff, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    text: String,
}

async fn reply_to_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplyRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reply = state
        .services
        .reviews
        .reply_to_review(user.id, id, payload.text)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(reply))
}

async fn create_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateReportInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let report = state
        .services
        .reviews
        .report(user.id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(report))
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    super::products::require_staff(&user)?;

    let reports = state
        .services
        .reviews
        .list_reports()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(reports))
}
