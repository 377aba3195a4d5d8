mod common;

use async_trait::async_trait;
use common::{seed_category, seed_product, seed_user, stock_of, TestContext};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use std::sync::Arc;
use storefront_api::{
    config::AppConfig,
    entities::{CartItem, Order, OrderStatus, PaymentMethod},
    errors::ServiceError,
    services::{
        cart::{AddToCartInput, CartService},
        orders::{CreateOrderInput, OrderItemInput, OrderService},
        payments::{GatewayError, IntentRequest, PaymentGateway, PaymentIntent},
    },
};

/// Gateway double: records nothing, answers with a canned intent.
struct StubGateway {
    retrieve_status: &'static str,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError> {
        Ok(PaymentIntent {
            id: format!("pi_stub_{}", request.order_id.simple()),
            status: "requires_payment_method".to_string(),
            client_secret: Some("cs_stub_secret".to_string()),
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            status: self.retrieve_status.to_string(),
            client_secret: None,
        })
    }
}

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig::new(
        "sqlite::memory:".to_string(),
        "a_test_secret_that_is_long_enough_to_pass".to_string(),
        "127.0.0.1".to_string(),
        0,
    ))
}

fn order_service(ctx: &TestContext, retrieve_status: &'static str) -> OrderService {
    OrderService::new(
        ctx.db.clone(),
        ctx.event_sender.clone(),
        Arc::new(StubGateway { retrieve_status }),
        test_config(),
    )
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn cod_checkout_decrements_stock_and_clears_cart() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");
    let carts = CartService::new(ctx.db.clone(), ctx.event_sender.clone());

    let user_id = seed_user(&ctx, "buyer@example.com").await;
    let category_id = seed_category(&ctx, "Sneakers").await;
    let product_id = seed_product(&ctx, category_id, "Runner", dec!(10.00), None, 5).await;

    carts
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let placed = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 2,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .expect("order should be created");

    assert_eq!(placed.order.total_price, dec!(20.00));
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert!(!placed.order.is_paid);
    assert!(placed.payment.is_none());

    assert_eq!(stock_of(&ctx, product_id).await, 3);

    // Cart was emptied best-effort after the commit.
    let leftover = CartItem::find().count(&*ctx.db).await.unwrap();
    assert_eq!(leftover, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn insufficient_stock_leaves_product_untouched() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let user_id = seed_user(&ctx, "greedy@example.com").await;
    let category_id = seed_category(&ctx, "Heels").await;
    let product_id = seed_product(&ctx, category_id, "Stiletto", dec!(50.00), None, 1).await;

    let err = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 2,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .expect_err("stock of 1 cannot satisfy 2");

    match err {
        ServiceError::InsufficientStock(msg) => {
            assert!(msg.contains("Stiletto"));
            assert!(msg.contains("1"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(stock_of(&ctx, product_id).await, 1);
    assert_eq!(Order::find().count(&*ctx.db).await.unwrap(), 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn zero_priced_order_fails_with_invalid_total_and_no_stock_mutation() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let user_id = seed_user(&ctx, "freeloader@example.com").await;
    let category_id = seed_category(&ctx, "Promo").await;
    let product_id = seed_product(&ctx, category_id, "Freebie", dec!(0.00), None, 5).await;

    let err = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 2,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .expect_err("zero total must be rejected");
    assert!(matches!(err, ServiceError::InvalidOrderTotal(_)));

    // The whole transaction rolled back: stock untouched, no order row.
    assert_eq!(stock_of(&ctx, product_id).await, 5);
    assert_eq!(Order::find().count(&*ctx.db).await.unwrap(), 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn duplicate_submission_within_window_is_rejected() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let user_id = seed_user(&ctx, "doubleclick@example.com").await;
    let category_id = seed_category(&ctx, "Loafers").await;
    let product_id = seed_product(&ctx, category_id, "Penny", dec!(30.00), None, 10).await;

    let input = || CreateOrderInput {
        items: vec![OrderItemInput {
            product_id,
            quantity: 1,
        }],
        shipping_address: "1 Market St".to_string(),
        payment_method: PaymentMethod::Cod,
    };

    orders.create_order(user_id, input()).await.unwrap();
    let err = orders
        .create_order(user_id, input())
        .await
        .expect_err("second identical order inside the window");
    assert!(matches!(err, ServiceError::DuplicateOrder(_)));

    // A different address is not a duplicate.
    orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 1,
                }],
                shipping_address: "2 Other Ave".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .expect("different address passes the guard");
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn confirming_payment_on_cod_order_is_invalid() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let user_id = seed_user(&ctx, "cod@example.com").await;
    let category_id = seed_category(&ctx, "Boots").await;
    let product_id = seed_product(&ctx, category_id, "Workboot", dec!(40.00), None, 5).await;

    let placed = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 1,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .unwrap();

    let err = orders
        .confirm_payment(user_id, placed.order.id, "pi_whatever")
        .await
        .expect_err("cod orders have nothing to confirm");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    let row = Order::find_by_id(placed.order.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!row.is_paid);
    assert_eq!(row.status, OrderStatus::Pending);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn card_checkout_returns_intent_and_confirmation_ships_the_order() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let user_id = seed_user(&ctx, "card@example.com").await;
    let category_id = seed_category(&ctx, "Trainers").await;
    let product_id = seed_product(&ctx, category_id, "Sprint", dec!(25.00), None, 5).await;

    let placed = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 1,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Card,
            },
        )
        .await
        .unwrap();

    let payment = placed.payment.expect("card orders return a payment handle");
    assert!(payment.payment_intent_id.starts_with("pi_stub_"));
    assert_eq!(payment.client_secret.as_deref(), Some("cs_stub_secret"));

    let confirmed = orders
        .confirm_payment(user_id, placed.order.id, &payment.payment_intent_id)
        .await
        .expect("stub reports succeeded");
    assert!(confirmed.is_paid);
    assert_eq!(confirmed.status, OrderStatus::Shipped);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn unsettled_intent_does_not_mark_the_order_paid() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "requires_action");

    let user_id = seed_user(&ctx, "pending@example.com").await;
    let category_id = seed_category(&ctx, "Trainers").await;
    let product_id = seed_product(&ctx, category_id, "Jogger", dec!(25.00), None, 5).await;

    let placed = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 1,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Card,
            },
        )
        .await
        .unwrap();

    let err = orders
        .confirm_payment(user_id, placed.order.id, "pi_anything")
        .await
        .expect_err("intent has not succeeded");
    match err {
        ServiceError::PaymentNotSucceeded(status) => assert_eq!(status, "requires_action"),
        other => panic!("unexpected error: {:?}", other),
    }

    let row = Order::find_by_id(placed.order.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!row.is_paid);
    assert_eq!(row.status, OrderStatus::Pending);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn cancelling_restores_stock() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let user_id = seed_user(&ctx, "undo@example.com").await;
    let category_id = seed_category(&ctx, "Sandals").await;
    let product_id = seed_product(&ctx, category_id, "Slide", dec!(12.00), None, 8).await;

    let placed = orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 3,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&ctx, product_id).await, 5);

    orders
        .cancel_order(user_id, placed.order.id)
        .await
        .expect("pending unpaid orders cancel");

    assert_eq!(stock_of(&ctx, product_id).await, 8);
    assert_eq!(Order::find().count(&*ctx.db).await.unwrap(), 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn orders_are_scoped_to_their_owner() {
    let ctx = TestContext::new().await;
    let orders = order_service(&ctx, "succeeded");

    let owner = seed_user(&ctx, "owner@example.com").await;
    let stranger = seed_user(&ctx, "snoop@example.com").await;
    let category_id = seed_category(&ctx, "Boots").await;
    let product_id = seed_product(&ctx, category_id, "Hiker", dec!(60.00), None, 4).await;

    let placed = orders
        .create_order(
            owner,
            CreateOrderInput {
                items: vec![OrderItemInput {
                    product_id,
                    quantity: 1,
                }],
                shipping_address: "1 Market St".to_string(),
                payment_method: PaymentMethod::Cod,
            },
        )
        .await
        .unwrap();

    let err = orders
        .get_order(stranger, placed.order.id)
        .await
        .expect_err("strangers cannot read the order");
    assert!(matches!(err, ServiceError::NotFound(_)));

    // Snapshot pricing: the line price is fixed even if the catalog moves.
    let history = orders.order_history(owner).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].items[0].price, dec!(60.00));
}
