use crate::{
    entities::{cart, cart_item, Cart, CartItem, CartItemModel, Product, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service.
///
/// Carts are created lazily on first add and validated against live stock on
/// every mutation. Prices shown here use the discounted price when present;
/// the order service snapshots the list price instead.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Unit price a cart line is displayed at: the discount price when the
/// product has one, the list price otherwise.
pub fn effective_unit_price(product: &ProductModel) -> Decimal {
    product.discount_price.unwrap_or(product.price)
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the user's cart, merging with an existing line.
    ///
    /// Quantities are additive: adding 2 to a line that already holds 3
    /// yields 5. Fails without mutating anything when the merged quantity
    /// would exceed the available stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartLine, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let cart = self.get_or_create_cart(&txn, user_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        let new_quantity = match &existing {
            Some(item) => item.quantity + input.quantity,
            None => input.quantity,
        };

        if new_quantity > product.stock_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} items available in stock",
                product.stock_quantity
            )));
        }

        let item = match existing {
            Some(item) => {
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            None => {
                let item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(input.product_id),
                    quantity: Set(new_quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                item.insert(&txn).await?
            }
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added item to cart {}: product {} x{}",
            cart.id, input.product_id, input.quantity
        );
        Ok(cart_line(&item, &product))
    }

    /// Sets the quantity of a cart item.
    ///
    /// Zero (or negative) removes the line; that is a legitimate "remove"
    /// signal, not an error. Raising the quantity beyond the available stock
    /// fails without mutating the line.
    #[instrument(skip(self))]
    pub async fn set_item_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<QuantityUpdate, ServiceError> {
        let txn = self.db.begin().await?;

        let (item, product) = self.owned_item(&txn, user_id, item_id).await?;

        if quantity <= 0 {
            let cart_id = item.cart_id;
            cart_item::Entity::delete_by_id(item.id).exec(&txn).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved { cart_id, item_id })
                .await;
            return Ok(QuantityUpdate::Removed);
        }

        if quantity > product.stock_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} items available in stock",
                product.stock_quantity
            )));
        }

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let item = active.update(&txn).await?;

        txn.commit().await?;

        Ok(QuantityUpdate::Updated(cart_line(&item, &product)))
    }

    /// Removes a cart item. Idempotent: a missing item reports
    /// `AlreadyAbsent` rather than erroring.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<RemoveOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        match self.owned_item(&txn, user_id, item_id).await {
            Ok((item, _)) => {
                let cart_id = item.cart_id;
                cart_item::Entity::delete_by_id(item.id).exec(&txn).await?;
                txn.commit().await?;

                self.event_sender
                    .send_or_log(Event::CartItemRemoved { cart_id, item_id })
                    .await;
                Ok(RemoveOutcome::Removed)
            }
            Err(ServiceError::NotFound(_)) => Ok(RemoveOutcome::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }

    /// Empties the user's cart. Idempotent: an empty (or missing) cart
    /// reports `AlreadyEmpty`.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<ClearOutcome, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let cart = match cart {
            Some(cart) => cart,
            None => return Ok(ClearOutcome::AlreadyEmpty),
        };

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?
            .rows_affected;

        if deleted == 0 {
            return Ok(ClearOutcome::AlreadyEmpty);
        }

        self.event_sender
            .send_or_log(Event::CartCleared(cart.id))
            .await;

        info!("Cleared cart {} ({} items)", cart.id, deleted);
        Ok(ClearOutcome::Cleared { items: deleted })
    }

    /// Returns the cart contents with per-line and grand totals. An empty
    /// cart is a normal response, not an error.
    #[instrument(skip(self))]
    pub async fn view_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let cart = match cart {
            Some(cart) => cart,
            None => return Ok(CartView::empty()),
        };

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total_price = Decimal::ZERO;
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart item {} references a missing product",
                    item.id
                ))
            })?;
            let line = cart_line(&item, &product);
            total_price += line.total;
            items.push(line);
        }

        Ok(CartView { items, total_price })
    }

    async fn get_or_create_cart(
        &self,
        conn: &impl ConnectionTrait,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        let existing = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?;

        if let Some(cart) = existing {
            return Ok(cart);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        Ok(cart.insert(conn).await?)
    }

    /// Loads a cart item and its product, verifying the item sits in the
    /// requesting user's cart.
    async fn owned_item(
        &self,
        conn: &impl ConnectionTrait,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<(CartItemModel, ProductModel), ServiceError> {
        let found = CartItem::find_by_id(item_id)
            .find_also_related(Cart)
            .one(conn)
            .await?;

        let item = match found {
            Some((item, Some(cart))) if cart.user_id == user_id => item,
            _ => {
                return Err(ServiceError::NotFound(format!(
                    "Cart item {} not found",
                    item_id
                )))
            }
        };

        let product = Product::find_by_id(item.product_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart item {} references a missing product",
                    item.id
                ))
            })?;

        Ok((item, product))
    }
}

fn cart_line(item: &CartItemModel, product: &ProductModel) -> CartLine {
    let price = effective_unit_price(product);
    CartLine {
        item_id: item.id,
        product_id: product.id,
        product_name: product.name.clone(),
        quantity: item.quantity,
        unit_price: price,
        total: price * Decimal::from(item.quantity),
        stock_quantity: product.stock_quantity,
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// One cart line with computed pricing
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub stock_quantity: i32,
}

/// Result of a quantity update
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuantityUpdate {
    Updated(CartLine),
    Removed,
}

/// Result of removing a single item
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    AlreadyAbsent,
}

/// Result of clearing the cart
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClearOutcome {
    Cleared { items: u64 },
    AlreadyEmpty,
}

/// Cart contents with the grand total
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_price: Decimal,
}

impl CartView {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_price: Decimal::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, discount: Option<Decimal>, stock: i32) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            name: "Suede Loafer".to_string(),
            description: "A shoe".to_string(),
            price,
            discount_price: discount,
            stock_quantity: stock,
            category_id: Uuid::new_v4(),
            average_rating: 0.0,
            sizes: None,
            colors: None,
            material: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn discount_price_wins_when_present() {
        let p = product(dec!(50.00), Some(dec!(39.99)), 10);
        assert_eq!(effective_unit_price(&p), dec!(39.99));
    }

    #[test]
    fn list_price_used_without_discount() {
        let p = product(dec!(50.00), None, 10);
        assert_eq!(effective_unit_price(&p), dec!(50.00));
    }

    #[test]
    fn cart_line_totals_use_discounted_price() {
        let p = product(dec!(20.00), Some(dec!(15.00)), 10);
        let item = CartItemModel {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: p.id,
            quantity: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let line = cart_line(&item, &p);
        assert_eq!(line.unit_price, dec!(15.00));
        assert_eq!(line.total, dec!(45.00));
        assert_eq!(line.stock_quantity, 10);
    }

    #[test]
    fn empty_cart_view_marker() {
        let view = CartView::empty();
        assert!(view.is_empty());
        assert_eq!(view.total_price, Decimal::ZERO);
    }
}
