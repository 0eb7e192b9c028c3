mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use common::{operator, order, product, TestApp};
use packhouse_api::{
    entities::order as order_entity,
    errors::ServiceError,
    services::order_status::OrderBucket,
};

async fn mark_packed(app: &TestApp, order_number: &str) {
    app.state
        .services
        .order_status
        .transition_by_number(order_number, OrderBucket::Picked)
        .await
        .expect("advance to picked");
    app.state
        .services
        .order_status
        .transition_by_number(order_number, OrderBucket::PackedPendingShip)
        .await
        .expect("advance to packed");
}

#[tokio::test]
async fn finalize_without_verified_orders_fails_cleanly() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .shipping
        .finalize_batch(operator())
        .await
        .expect_err("empty finalize must fail");
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let manifests = app
        .state
        .services
        .shipping
        .list_manifests()
        .await
        .expect("list manifests");
    assert!(manifests.is_empty());
}

#[tokio::test]
async fn check_then_finalize_ships_the_cohort() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("H1", 1, "Ship item")]).await;
    app.seed_orders(vec![
        order("ORD-30", &[("H1", "SKU-H", 1)]),
        order("ORD-31", &[("H1", "SKU-H", 2)]),
    ])
    .await;
    mark_packed(&app, "ORD-30").await;
    mark_packed(&app, "ORD-31").await;

    // Lookup trims scanner padding.
    let found = app
        .state
        .services
        .shipping
        .find_order_for_checking("  ORD-30  ")
        .await
        .expect("lookup");
    assert!(found.is_some());

    let checked = app
        .state
        .services
        .shipping
        .check_order("ORD-30")
        .await
        .expect("check order");
    assert!(checked.checked);

    let err = app
        .state
        .services
        .shipping
        .check_order("ORD-30")
        .await
        .expect_err("double verification must fail");
    assert_matches!(err, ServiceError::InvalidInput(_));

    let queue = app
        .state
        .services
        .shipping
        .pending_checked_orders()
        .await
        .expect("queue");
    assert_eq!(queue.len(), 1);

    let op = operator();
    let outcome = app
        .state
        .services
        .shipping
        .finalize_batch(op)
        .await
        .expect("finalize");
    assert_eq!(outcome.order_count, 1);
    assert!(outcome.manifest.batch_number.starts_with("MAN-"));
    assert_eq!(outcome.manifest.created_by, op);

    let shipped = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("ORD-30"))
        .one(&*app.state.db)
        .await
        .expect("query order")
        .expect("order exists");
    assert_eq!(shipped.status_bucket, "shipped");
    assert_eq!(shipped.manifest_id, Some(outcome.manifest.id));

    // The unchecked order stays behind for the next batch.
    let left_behind = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("ORD-31"))
        .one(&*app.state.db)
        .await
        .expect("query order")
        .expect("order exists");
    assert_eq!(left_behind.status_bucket, "packed_pending_ship");
    assert_eq!(left_behind.manifest_id, None);

    let manifests = app
        .state
        .services
        .shipping
        .list_manifests()
        .await
        .expect("list manifests");
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].order_count, 1);

    let detail = app
        .state
        .services
        .shipping
        .manifest_detail(outcome.manifest.id)
        .await
        .expect("detail")
        .expect("manifest exists");
    assert_eq!(detail.orders.len(), 1);
    assert_eq!(detail.orders[0].order_number, "ORD-30");
}

#[tokio::test]
async fn shipped_orders_are_terminal() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("J1", 1, "Terminal item")]).await;
    app.seed_orders(vec![order("ORD-32", &[("J1", "SKU-J", 1)])])
        .await;
    mark_packed(&app, "ORD-32").await;
    app.state
        .services
        .shipping
        .check_order("ORD-32")
        .await
        .expect("check");
    app.state
        .services
        .shipping
        .finalize_batch(operator())
        .await
        .expect("finalize");

    let err = app
        .state
        .services
        .order_status
        .transition_by_number("ORD-32", OrderBucket::Picked)
        .await
        .expect_err("shipped order must not move backwards");
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn shipped_bucket_is_reserved_for_the_finalizer() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("K1", 1, "Reserved item")]).await;
    app.seed_orders(vec![order("ORD-33", &[("K1", "SKU-K", 1)])])
        .await;
    mark_packed(&app, "ORD-33").await;

    let err = app
        .state
        .services
        .order_status
        .transition_by_number("ORD-33", OrderBucket::Shipped)
        .await
        .expect_err("direct shipped transition must fail");
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn unpacked_orders_are_not_checkable() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("L1", 1, "Early item")]).await;
    app.seed_orders(vec![order("ORD-34", &[("L1", "SKU-L", 1)])])
        .await;

    let found = app
        .state
        .services
        .shipping
        .find_order_for_checking("ORD-34")
        .await
        .expect("lookup");
    assert!(found.is_none());

    let err = app
        .state
        .services
        .shipping
        .check_order("ORD-34")
        .await
        .expect_err("pending order must not be checkable");
    assert_matches!(err, ServiceError::NotFound(_));
}
