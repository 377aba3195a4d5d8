use crate::{config::AppConfig, entities};
use sea_orm::{
    sea_query::Index, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool to the database.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true);

    let db = Database::connect(options).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates any missing tables and indexes.
///
/// Derived from the entity definitions so the schema has a single source of
/// truth; safe to run repeatedly.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create_table {
        ($entity:expr) => {{
            let mut stmt = schema.create_table_from_entity($entity);
            stmt.if_not_exists();
            db.execute(backend.build(&stmt)).await?;
        }};
    }

    create_table!(entities::user::Entity);
    create_table!(entities::address::Entity);
    create_table!(entities::category::Entity);
    create_table!(entities::product::Entity);
    create_table!(entities::product_image::Entity);
    create_table!(entities::cart::Entity);
    create_table!(entities::cart_item::Entity);
    create_table!(entities::order::Entity);
    create_table!(entities::order_item::Entity);
    create_table!(entities::rating::Entity);
    create_table!(entities::review::Entity);
    create_table!(entities::review_reply::Entity);
    create_table!(entities::report::Entity);

    // Composite uniques the entity derives cannot express.
    let indexes = [
        Index::create()
            .if_not_exists()
            .name("ux_cart_items_cart_product")
            .table(entities::cart_item::Entity)
            .col(entities::cart_item::Column::CartId)
            .col(entities::cart_item::Column::ProductId)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("ux_ratings_user_product")
            .table(entities::rating::Entity)
            .col(entities::rating::Column::UserId)
            .col(entities::rating::Column::ProductId)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("ux_reviews_user_product")
            .table(entities::review::Entity)
            .col(entities::review::Column::UserId)
            .col(entities::review::Column::ProductId)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("ux_categories_name_section")
            .table(entities::category::Entity)
            .col(entities::category::Column::Name)
            .col(entities::category::Column::Section)
            .unique()
            .to_owned(),
    ];

    for idx in indexes {
        db.execute(backend.build(&idx)).await?;
    }

    info!("Schema is up to date");
    Ok(())
}
