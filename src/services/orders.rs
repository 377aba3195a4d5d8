use crate::{
    config::AppConfig,
    entities::{
        cart, cart_item, order, order_item, product, Cart, CartItem, Order, OrderItem,
        OrderItemModel, OrderModel, OrderStatus, PaymentMethod, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::{GatewayError, IntentRequest, PaymentGateway},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order service: checkout, payment confirmation and cancellation.
///
/// Stock decrement, order-item insertion and the order re-total run in one
/// transaction per order; a failure anywhere rolls the whole order back, so
/// stock can never be decremented without its item row (or vice versa).
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            config,
        }
    }

    /// Places an order from the supplied line items.
    ///
    /// Line prices are snapshotted from the product's current list price (not
    /// the cart's discounted display price); stock is decremented with a
    /// conditional update so a concurrent order can never drive it negative.
    /// The user's cart is cleared best-effort after the order commits.
    ///
    /// For card orders, a payment intent is created with a fresh idempotency
    /// key and the intent id plus client secret are returned alongside the
    /// order. The committed order survives a failed intent creation; the
    /// client may retry confirmation later.
    #[instrument(skip(self, input), fields(user_id = %user_id, items = input.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<PlacedOrder, ServiceError> {
        validate_order_request(&input)?;
        let shipping_address = input.shipping_address.trim().to_string();

        // Soft duplicate guard: a pending order with the same address inside
        // the window is treated as a double submission. Two concurrent
        // requests can both pass this check; that race is accepted.
        let cutoff = duplicate_window_cutoff(
            Utc::now(),
            self.config.duplicate_order_window_secs,
        );
        let duplicates = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::ShippingAddress.eq(shipping_address.clone()))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(order::Column::CreatedAt.gte(cutoff))
            .count(&*self.db)
            .await?;
        if duplicates > 0 {
            warn!("Duplicate order detected for user {}", user_id);
            return Err(ServiceError::DuplicateOrder(
                "An identical order was recently created. Please check your order history."
                    .to_string(),
            ));
        }

        // Pre-check stock so the common case fails with a precise message
        // before anything is written. The conditional update below re-checks
        // at write time.
        for item in &input.items {
            let product = Product::find_by_id(item.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            if item.quantity > product.stock_quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Not enough stock for {}. Available: {}",
                    product.name, product.stock_quantity
                )));
            }
        }

        let txn = self.db.begin().await?;

        let order_id = Uuid::new_v4();
        let order_row = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            total_price: Set(Decimal::ZERO),
            shipping_address: Set(shipping_address),
            is_paid: Set(false),
            payment_method: Set(input.payment_method),
            created_at: Set(Utc::now()),
        };
        let order_row = order_row.insert(&txn).await?;

        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = Product::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            // Conditional decrement: only succeeds while enough stock
            // remains, closing the race with the pre-check above.
            let decrement = Product::update_many()
                .col_expr(
                    product::Column::StockQuantity,
                    Expr::col(product::Column::StockQuantity).sub(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .filter(product::Column::StockQuantity.gte(item.quantity))
                .exec(&txn)
                .await?;
            if decrement.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Not enough stock for {}. Available: {}",
                    product.name, product.stock_quantity
                )));
            }

            // Snapshot the list price, not the discounted cart price.
            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price: Set(product.price),
            };
            let line = line.insert(&txn).await?;
            total += product.price * Decimal::from(item.quantity);
            lines.push(line);
        }

        let mut active: order::ActiveModel = order_row.into();
        active.total_price = Set(total);
        let order_row = active.update(&txn).await?;

        if total <= Decimal::ZERO {
            // Rolls back with the transaction: no stock mutation survives.
            return Err(ServiceError::InvalidOrderTotal(
                "Order total must be greater than zero".to_string(),
            ));
        }

        txn.commit().await?;

        self.clear_cart_best_effort(user_id).await;
        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        info!(
            "Order {} created for user {} (total {})",
            order_id, user_id, total
        );

        let payment = match order_row.payment_method {
            PaymentMethod::Cod => None,
            PaymentMethod::Card => Some(self.create_intent_for(&order_row).await?),
        };

        Ok(PlacedOrder {
            order: order_response(order_row, lines),
            payment,
        })
    }

    /// Confirms a card payment for an order.
    ///
    /// Retrieves the intent from the gateway; a succeeded intent marks the
    /// order paid and shipped in a single row update, so no partial state is
    /// observable. Any other intent status is reported back to the caller.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let order_row = self.owned_order(user_id, order_id).await?;

        if order_row.payment_method == PaymentMethod::Cod {
            return Err(ServiceError::InvalidOperation(
                "Cannot confirm payment for Cash on Delivery orders".to_string(),
            ));
        }

        let intent = self
            .gateway
            .retrieve_intent(payment_intent_id)
            .await
            .map_err(map_gateway_error)?;

        if !intent.succeeded() {
            warn!(
                "Payment confirmation for order {} in status {}",
                order_id, intent.status
            );
            return Err(ServiceError::PaymentNotSucceeded(intent.status));
        }

        let mut active: order::ActiveModel = order_row.into();
        active.is_paid = Set(true);
        active.status = Set(OrderStatus::Shipped);
        let order_row = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderPaid(order_id))
            .await;
        info!("Payment confirmed for order {}", order_id);

        let items = self.items_of(order_id).await?;
        Ok(order_response(order_row, items))
    }

    /// Cancels a pending, unpaid order, restoring every line's stock.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let order_row = self.owned_order(user_id, order_id).await?;

        if order_row.status != OrderStatus::Pending || order_row.is_paid {
            return Err(ServiceError::InvalidOperation(
                "Only pending, unpaid orders can be cancelled".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        // Deleting an order item restores exactly the stock its creation
        // removed.
        for item in &items {
            Product::update_many()
                .col_expr(
                    product::Column::StockQuantity,
                    Expr::col(product::Column::StockQuantity).add(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }

        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        info!("Order {} cancelled, stock restored", order_id);
        Ok(())
    }

    /// Returns the caller's orders, newest first.
    #[instrument(skip(self))]
    pub async fn order_history(&self, user_id: Uuid) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order_row in orders {
            let items = self.items_of(order_row.id).await?;
            responses.push(order_response(order_row, items));
        }
        Ok(responses)
    }

    /// Fetches one of the caller's orders with its line items.
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order_row = self.owned_order(user_id, order_id).await?;
        let items = self.items_of(order_id).await?;
        Ok(order_response(order_row, items))
    }

    async fn owned_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    async fn items_of(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    async fn create_intent_for(
        &self,
        order_row: &OrderModel,
    ) -> Result<PaymentHandle, ServiceError> {
        let request = IntentRequest {
            amount_minor: to_minor_units(order_row.total_price)?,
            currency: self.config.currency.clone(),
            user_id: order_row.user_id,
            order_id: order_row.id,
            // Fresh key per attempt: protects against gateway-side double
            // charging on retries of this call, not against duplicate orders.
            idempotency_key: Uuid::new_v4().to_string(),
        };

        let intent = self
            .gateway
            .create_intent(request)
            .await
            .map_err(map_gateway_error)?;

        self.event_sender
            .send_or_log(Event::PaymentIntentCreated {
                order_id: order_row.id,
                intent_id: intent.id.clone(),
            })
            .await;

        Ok(PaymentHandle {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    /// Absence of a cart is not an error here; the order already exists.
    async fn clear_cart_best_effort(&self, user_id: Uuid) {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await;

        match cart {
            Ok(Some(cart_row)) => {
                let result = CartItem::delete_many()
                    .filter(cart_item::Column::CartId.eq(cart_row.id))
                    .exec(&*self.db)
                    .await;
                match result {
                    Ok(_) => {
                        self.event_sender
                            .send_or_log(Event::CartCleared(cart_row.id))
                            .await;
                        info!("Cart cleared for user {} after checkout", user_id);
                    }
                    Err(e) => warn!(error = %e, "Failed to clear cart after checkout"),
                }
            }
            Ok(None) => warn!("No cart found for user {} after checkout", user_id),
            Err(e) => warn!(error = %e, "Failed to load cart after checkout"),
        }
    }
}

fn validate_order_request(input: &CreateOrderInput) -> Result<(), ServiceError> {
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "Order must contain at least one item".to_string(),
        ));
    }
    if input.items.iter().any(|item| item.quantity < 1) {
        return Err(ServiceError::ValidationError(
            "Item quantities must be at least 1".to_string(),
        ));
    }
    if input.shipping_address.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Shipping address is required".to_string(),
        ));
    }
    Ok(())
}

fn duplicate_window_cutoff(now: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    now - Duration::seconds(window_secs.max(0))
}

/// Converts a (10, 2) money amount to minor units for the gateway.
fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Order total {} out of range", amount))
        })
}

fn map_gateway_error(err: GatewayError) -> ServiceError {
    match err {
        GatewayError::CardDeclined(msg) => ServiceError::PaymentFailed(format!("Card error: {}", msg)),
        GatewayError::Provider(msg) => {
            ServiceError::PaymentFailed(format!("Payment processing failed: {}", msg))
        }
        GatewayError::Transport(msg) => ServiceError::InternalError(msg),
    }
}

fn order_response(order_row: OrderModel, items: Vec<OrderItemModel>) -> OrderResponse {
    let items = items
        .into_iter()
        .map(|item| OrderLine {
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            line_total: item.price * Decimal::from(item.quantity),
        })
        .collect();

    OrderResponse {
        id: order_row.id,
        status: order_row.status,
        total_price: order_row.total_price,
        shipping_address: order_row.shipping_address,
        is_paid: order_row.is_paid,
        payment_method: order_row.payment_method,
        created_at: order_row.created_at,
        items,
    }
}

/// One requested line of a new order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Input for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}

/// Gateway handle returned for card orders
#[derive(Debug, Serialize)]
pub struct PaymentHandle {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
}

/// An order line with its immutable price snapshot
#[derive(Debug, Serialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
}

/// Order as returned to clients
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub shipping_address: String,
    pub is_paid: bool,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLine>,
}

/// Result of `create_order`
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: OrderResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentHandle>,
}
