pub mod accounts;
pub mod carts;
pub mod common;
pub mod orders;
pub mod products;
pub mod reviews;

use crate::{
    auth::{auth_middleware, AuthService},
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    notifications::Mailer,
    services,
};
use axum::{middleware, response::Json, routing::get, Router};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<services::CatalogService>,
    pub cart: Arc<services::CartService>,
    pub orders: Arc<services::OrderService>,
    pub reviews: Arc<services::ReviewService>,
    pub accounts: Arc<services::AccountService>,
}

impl AppServices {
    /// Builds the full service container.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn services::PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        auth: Arc<AuthService>,
        config: Arc<AppConfig>,
    ) -> Self {
        let catalog = Arc::new(services::CatalogService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let cart = Arc::new(services::CartService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(services::OrderService::new(
            db.clone(),
            event_sender.clone(),
            gateway,
            config.clone(),
        ));
        let reviews = Arc::new(services::ReviewService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let accounts = Arc::new(services::AccountService::new(
            db,
            event_sender,
            mailer,
            auth,
            config,
        ));

        Self {
            catalog,
            cart,
            orders,
            reviews,
            accounts,
        }
    }
}

/// Assembles the full application router.
///
/// Public routes (catalog reads, registration, activation, login, password
/// reset) sit next to a protected group behind the bearer-token middleware.
pub fn api_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .nest("/cart", carts::carts_routes())
        .nest("/orders", orders::orders_routes())
        .nest("/me", accounts::accounts_me_routes())
        .nest("/admin", products::catalog_admin_routes())
        .merge(reviews::reviews_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .nest("/products", products::products_routes())
        .nest("/categories", products::categories_routes())
        .nest("/accounts", accounts::accounts_public_routes());

    Router::new()
        .nest("/api", public.merge(protected))
        .route("/health", get(health))
        .with_state(state)
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
