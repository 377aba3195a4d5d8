use crate::handlers::common::{
    created_response, map_service_error, message_response, success_response, validate_input,
};
use crate::{
    auth::CurrentUser,
    errors::ApiError,
    services::accounts::{
        AddressInput, LoginInput, RegisterInput, UpdateProfileInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Public account routes: registration, activation, login, password reset.
pub fn accounts_public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/activate/:uid/:token", get(activate))
        .route("/login", post(login))
        .route("/password-reset/request", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

/// Authenticated profile/address routes.
pub fn accounts_me_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(profile))
        .route("/", put(update_profile))
        .route("/", delete(delete_account))
        .route("/address", get(my_address))
        .route("/address", put(upsert_address))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let profile = state
        .services
        .accounts
        .register(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(profile))
}

async fn activate(
    State(state): State<Arc<AppState>>,
    Path((uid, token)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .accounts
        .activate(&uid, &token)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Account activated successfully"))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let response = state
        .services
        .accounts
        .login(payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(response))
}

#[derive(Debug, Deserialize)]
struct ResetRequestBody {
    email: String,
}

async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetRequestBody>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .accounts
        .request_password_reset(&payload.email)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(outcome))
}

#[derive(Debug, Deserialize)]
struct ResetConfirmBody {
    uid: String,
    token: String,
    new_password: String,
}

async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetConfirmBody>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .accounts
        .confirm_password_reset(&payload.uid, &payload.token, &payload.new_password)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Password reset successfully."))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state
        .services
        .accounts
        .profile(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(profile))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state
        .services
        .accounts
        .update_profile(user.id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(profile))
}

#[derive(Debug, Deserialize)]
struct DeleteAccountBody {
    password: String,
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<DeleteAccountBody>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .accounts
        .delete_account(user.id, &payload.password)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Account deleted successfully."))
}

async fn my_address(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let address = state
        .services
        .accounts
        .my_address(user.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}

async fn upsert_address(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<AddressInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let address = state
        .services
        .accounts
        .upsert_address(user.id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}
