#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;
use storefront_api::{
    auth::hash_password,
    db,
    entities::{category, product, user, CategorySection},
    events::{Event, EventSender},
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Test harness backed by an in-memory SQLite database.
///
/// The receiver half of the event channel is kept alive so services can
/// publish without the channel reporting closed.
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub event_sender: Arc<EventSender>,
    _event_rx: mpsc::Receiver<Event>,
}

impl TestContext {
    pub async fn new() -> Self {
        let mut options = ConnectOptions::new("sqlite::memory:".to_string());
        options.max_connections(1).min_connections(1);

        let conn = Database::connect(options)
            .await
            .expect("failed to open in-memory sqlite");
        db::run_migrations(&conn)
            .await
            .expect("failed to create schema");

        let (tx, rx) = mpsc::channel(1024);
        Self {
            db: Arc::new(conn),
            event_sender: Arc::new(EventSender::new(tx)),
            _event_rx: rx,
        }
    }
}

/// Inserts a category and returns its id.
pub async fn seed_category(ctx: &TestContext, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    category::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        section: Set(CategorySection::Women),
    }
    .insert(&*ctx.db)
    .await
    .expect("failed to seed category");
    id
}

/// Inserts a product and returns its id.
pub async fn seed_product(
    ctx: &TestContext,
    category_id: Uuid,
    name: &str,
    price: Decimal,
    discount_price: Option<Decimal>,
    stock: i32,
) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    product::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        description: Set(format!("{} description", name)),
        price: Set(price),
        discount_price: Set(discount_price),
        stock_quantity: Set(stock),
        category_id: Set(category_id),
        average_rating: Set(0.0),
        sizes: Set(None),
        colors: Set(None),
        material: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*ctx.db)
    .await
    .expect("failed to seed product");
    id
}

/// Inserts an active user and returns its id.
pub async fn seed_user(ctx: &TestContext, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    user::ActiveModel {
        id: Set(id),
        email: Set(email.to_string()),
        first_name: Set("Test".to_string()),
        last_name: Set("Shopper".to_string()),
        password_hash: Set(hash_password("test password 123").expect("hash")),
        is_active: Set(true),
        is_staff: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*ctx.db)
    .await
    .expect("failed to seed user");
    id
}

/// Reloads a product's stock counter.
pub async fn stock_of(ctx: &TestContext, product_id: Uuid) -> i32 {
    use sea_orm::EntityTrait;
    storefront_api::entities::Product::find_by_id(product_id)
        .one(&*ctx.db)
        .await
        .expect("query failed")
        .expect("product missing")
        .stock_quantity
}
