mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use common::{order, product, TestApp};
use packhouse_api::{
    entities::{order as order_entity, order_line, product as product_entity},
    errors::ServiceError,
    services::ingestion::{OrderImport, ProductImport},
};

#[tokio::test]
async fn product_reimport_updates_in_place() {
    let app = TestApp::new().await;

    let report = app
        .state
        .services
        .ingestion
        .upsert_products(vec![
            product("R100", 1, "First description"),
            product("R101", 1, "Another product"),
        ])
        .await
        .expect("first import");
    assert_eq!(report.inserted, 2);
    assert_eq!(report.updated, 0);

    let report = app
        .state
        .services
        .ingestion
        .upsert_products(vec![
            product("R100", 2, "Corrected description"),
            product("R102", 1, "Brand new product"),
        ])
        .await
        .expect("second import");
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);

    let updated = product_entity::Entity::find_by_id("R100")
        .one(&*app.state.db)
        .await
        .expect("query product")
        .expect("product exists");
    assert_eq!(updated.description, "Corrected description");
    assert_eq!(updated.department_code, 2);

    let total = product_entity::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("all products")
        .len();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn order_import_derives_kit_and_unit_count() {
    let app = TestApp::new().await;
    app.seed_products(vec![
        product("R200", 1, "Kit part one"),
        product("R201", 1, "Kit part two"),
    ])
    .await;

    app.seed_orders(vec![
        order("KIT-1", &[("R200", "SKU-200", 2), ("R201", "SKU-201", 1)]),
        order("ONE-1", &[("R200", "SKU-200", 4)]),
    ])
    .await;

    let kit = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("KIT-1"))
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("order exists");
    assert!(kit.is_kit);
    assert_eq!(kit.unit_count, 3);
    assert_eq!(kit.status_bucket, "pending");

    let single = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("ONE-1"))
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("order exists");
    assert!(!single.is_kit);
    assert_eq!(single.unit_count, 4);
}

#[tokio::test]
async fn reimport_with_a_new_line_reclassifies_the_order_as_kit() {
    let app = TestApp::new().await;
    app.seed_products(vec![
        product("R250", 1, "Grows part one"),
        product("R251", 1, "Grows part two"),
    ])
    .await;

    app.seed_orders(vec![order("GROW-1", &[("R250", "SKU-250", 2)])])
        .await;
    app.seed_orders(vec![order("GROW-1", &[("R251", "SKU-251", 3)])])
        .await;

    let lines = order_line::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("all lines");
    assert_eq!(lines.len(), 2);

    let grown = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("GROW-1"))
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("order exists");
    assert!(grown.is_kit);
    assert_eq!(grown.unit_count, 5);
}

#[tokio::test]
async fn order_reimport_leaves_bucket_and_done_units_alone() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("R300", 1, "Stable product")]).await;
    app.seed_orders(vec![order("STAY-1", &[("R300", "SKU-300", 2)])])
        .await;

    app.state
        .services
        .order_status
        .transition_by_number(
            "STAY-1",
            packhouse_api::services::order_status::OrderBucket::Picked,
        )
        .await
        .expect("advance bucket");

    let report = app
        .state
        .services
        .ingestion
        .upsert_orders(vec![order("STAY-1", &[("R300", "SKU-300", 2)])])
        .await
        .expect("reimport");
    assert_eq!(report.orders_updated, 1);
    assert_eq!(report.lines_updated, 1);
    assert_eq!(report.orders_inserted, 0);

    let row = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("STAY-1"))
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("order exists");
    assert_eq!(row.status_bucket, "picked");
}

#[tokio::test]
async fn line_status_recomputes_against_new_required() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("R400", 1, "Shrinking product")]).await;
    app.seed_orders(vec![order("SHRINK-1", &[("R400", "SKU-400", 3)])])
        .await;

    // Two units picked out of three.
    let ledger =
        packhouse_api::services::ledger::WorkLedgerService::new(app.state.db.clone());
    ledger.allocate_one_unit("R400").await.expect("alloc");
    ledger.allocate_one_unit("R400").await.expect("alloc");

    // The customer reduced the order to two units: the line is now done.
    app.seed_orders(vec![order("SHRINK-1", &[("R400", "SKU-400", 2)])])
        .await;

    let line = order_line::Entity::find()
        .filter(order_line::Column::ProductCode.eq("R400"))
        .one(&*app.state.db)
        .await
        .expect("query line")
        .expect("line exists");
    assert_eq!(line.quantity_done, 2);
    assert_eq!(line.quantity_required, 2);
    assert_eq!(line.status, order_line::STATUS_DONE);
}

#[tokio::test]
async fn invalid_imports_are_rejected_before_any_write() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .ingestion
        .upsert_products(vec![ProductImport {
            code: String::new(),
            manufacturer_code: None,
            description: "No code".to_string(),
            reference: None,
            unit: None,
            department_code: 1,
            department: None,
            active: true,
        }])
        .await
        .expect_err("blank code must fail");
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .state
        .services
        .ingestion
        .upsert_orders(vec![OrderImport {
            order_number: "EMPTY-1".to_string(),
            buyer: None,
            platform: None,
            placed_at: None,
            total_amount: None,
            lines: vec![],
        }])
        .await
        .expect_err("order without lines must fail");
    assert_matches!(err, ServiceError::InvalidInput(_));

    let orders = order_entity::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("all orders");
    assert!(orders.is_empty());
}
