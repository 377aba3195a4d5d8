mod common;

use common::{seed_category, seed_product, seed_user, TestContext};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use storefront_api::{
    entities::{cart_item, CartItem},
    errors::ServiceError,
    services::cart::{AddToCartInput, CartService, ClearOutcome, QuantityUpdate, RemoveOutcome},
};
use uuid::Uuid;

async fn setup() -> (TestContext, CartService, Uuid, Uuid) {
    let ctx = TestContext::new().await;
    let service = CartService::new(ctx.db.clone(), ctx.event_sender.clone());
    let user_id = seed_user(&ctx, "cart@example.com").await;
    let category_id = seed_category(&ctx, "Boots").await;
    let product_id = seed_product(&ctx, category_id, "Chelsea Boot", dec!(10.00), None, 5).await;
    (ctx, service, user_id, product_id)
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn adding_same_product_twice_is_additive() {
    let (ctx, service, user_id, product_id) = setup().await;

    service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 2,
            },
        )
        .await
        .expect("first add");
    let line = service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 1,
            },
        )
        .await
        .expect("second add");

    assert_eq!(line.quantity, 3);

    // Still a single row for the (cart, product) pair.
    let rows = CartItem::find()
        .filter(cart_item::Column::ProductId.eq(product_id))
        .count(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn adding_beyond_stock_fails_without_mutation() {
    let (ctx, service, user_id, product_id) = setup().await;

    service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 4,
            },
        )
        .await
        .expect("within stock");

    let err = service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 2,
            },
        )
        .await
        .expect_err("4 + 2 exceeds stock of 5");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The existing line kept its quantity.
    let item = CartItem::find()
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity, 4);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn setting_quantity_to_zero_removes_the_item() {
    let (ctx, service, user_id, product_id) = setup().await;

    let line = service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let outcome = service
        .set_item_quantity(user_id, line.item_id, 0)
        .await
        .unwrap();
    assert!(matches!(outcome, QuantityUpdate::Removed));

    let rows = CartItem::find().count(&*ctx.db).await.unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn setting_quantity_above_stock_fails_without_mutation() {
    let (ctx, service, user_id, product_id) = setup().await;

    let line = service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let err = service
        .set_item_quantity(user_id, line.item_id, 9)
        .await
        .expect_err("9 exceeds stock of 5");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let item = CartItem::find_by_id(line.item_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity, 2);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn removing_is_idempotent() {
    let (_ctx, service, user_id, product_id) = setup().await;

    let line = service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let first = service.remove_item(user_id, line.item_id).await.unwrap();
    assert_eq!(first, RemoveOutcome::Removed);

    let second = service.remove_item(user_id, line.item_id).await.unwrap();
    assert_eq!(second, RemoveOutcome::AlreadyAbsent);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn clearing_is_idempotent() {
    let (_ctx, service, user_id, product_id) = setup().await;

    // Clearing a never-created cart reports empty.
    let outcome = service.clear_cart(user_id).await.unwrap();
    assert_eq!(outcome, ClearOutcome::AlreadyEmpty);

    service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let outcome = service.clear_cart(user_id).await.unwrap();
    assert_eq!(outcome, ClearOutcome::Cleared { items: 1 });

    let outcome = service.clear_cart(user_id).await.unwrap();
    assert_eq!(outcome, ClearOutcome::AlreadyEmpty);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn view_cart_uses_discounted_prices() {
    let ctx = TestContext::new().await;
    let service = CartService::new(ctx.db.clone(), ctx.event_sender.clone());
    let user_id = seed_user(&ctx, "viewer@example.com").await;
    let category_id = seed_category(&ctx, "Sandals").await;
    let discounted =
        seed_product(&ctx, category_id, "Slide", dec!(20.00), Some(dec!(15.00)), 10).await;
    let plain = seed_product(&ctx, category_id, "Flip Flop", dec!(5.00), None, 10).await;

    service
        .add_item(
            user_id,
            AddToCartInput {
                product_id: discounted,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    service
        .add_item(
            user_id,
            AddToCartInput {
                product_id: plain,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let view = service.view_cart(user_id).await.unwrap();
    assert_eq!(view.items.len(), 2);
    // 2 x 15.00 (discounted) + 1 x 5.00 = 35.00
    assert_eq!(view.total_price, dec!(35.00));

    let discounted_line = view
        .items
        .iter()
        .find(|l| l.product_id == discounted)
        .unwrap();
    assert_eq!(discounted_line.unit_price, dec!(15.00));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn other_users_items_are_invisible() {
    let (ctx, service, user_id, product_id) = setup().await;
    let stranger = seed_user(&ctx, "stranger@example.com").await;

    let line = service
        .add_item(
            user_id,
            AddToCartInput {
                product_id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let err = service
        .set_item_quantity(stranger, line.item_id, 3)
        .await
        .expect_err("stranger cannot touch the item");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
