use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::CurrentUser,
    entities::CategorySection,
    errors::ApiError,
    services::catalog::{
        AddImageInput, CreateCategoryInput, CreateProductInput, ProductFilter, UpdateProductInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Public (read-only) product routes
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/reviews", get(super::reviews::list_product_reviews))
}

/// Staff-only catalog management routes
pub fn catalog_admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id", delete(delete_product))
        .route("/products/:id/images", post(add_product_image))
        .route("/categories", post(create_category))
}

/// Public category routes
pub fn categories_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_categories))
}

#[derive(Debug, Deserialize)]
struct ProductListQuery {
    page: Option<u64>,
    per_page: Option<u64>,
    category_id: Option<Uuid>,
    section: Option<CategorySection>,
    search: Option<String>,
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let pagination = PaginationParams::default();
    let page = query.page.unwrap_or(pagination.page);
    let per_page = query.per_page.unwrap_or(pagination.per_page);
    let filter = ProductFilter {
        category_id: query.category_id,
        section: query.section,
        search: query.search,
    };

    let (products, total) = state
        .services
        .catalog
        .list_products(filter, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products, page, per_page, total,
    )))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    require_staff(&user)?;
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    require_staff(&user)?;

    let product = state
        .services
        .catalog
        .update_product(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    require_staff(&user)?;

    state
        .services
        .catalog
        .delete_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

async fn add_product_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddImageInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    require_staff(&user)?;

    let image = state
        .services
        .catalog
        .add_product_image(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(image))
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(categories))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateCategoryInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    require_staff(&user)?;
    validate_input(&payload)?;

    let category = state
        .services
        .catalog
        .create_category(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(category))
}

pub(super) fn require_staff(user: &CurrentUser) -> Result<(), ApiError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(ApiError::ServiceError(
            crate::errors::ServiceError::Forbidden(
                "Staff permissions required".to_string(),
            ),
        ))
    }
}
