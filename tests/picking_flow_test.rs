mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use common::{operator, order, product, TestApp};
use packhouse_api::{
    entities::{order as order_entity, order_line, picking_lease},
    errors::ServiceError,
    services::ledger::WorkLedgerService,
};

#[tokio::test]
async fn picking_three_units_completes_line_and_order() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("P100", 7, "Widget")]).await;
    app.seed_orders(vec![order("ORD-1", &[("P100", "SKU100", 3)])])
        .await;

    let op = operator();
    let session = app
        .state
        .services
        .picking
        .assign(op, 7)
        .await
        .expect("assign")
        .expect("a product should be available");
    assert_eq!(session.product.code, "P100");
    assert_eq!(session.lease.target, 3);
    assert_eq!(session.remaining, 3);

    let first = app
        .state
        .services
        .picking
        .scan_unit(op, None)
        .await
        .expect("first scan");
    assert!(!first.finished);
    assert_eq!(first.remaining, 2);
    assert_eq!(first.completed, 1);

    let second = app
        .state
        .services
        .picking
        .scan_unit(op, None)
        .await
        .expect("second scan");
    assert!(!second.finished);
    assert_eq!(second.remaining, 1);
    assert_eq!(second.completed, 2);

    let third = app
        .state
        .services
        .picking
        .scan_unit(op, None)
        .await
        .expect("third scan");
    assert!(third.finished);
    assert_eq!(third.remaining, 0);
    assert_eq!(third.completed, 3);

    // Lease released on completion.
    let session = app
        .state
        .services
        .picking
        .current_session(op)
        .await
        .expect("current session");
    assert!(session.is_none());

    let line = order_line::Entity::find()
        .filter(order_line::Column::ProductCode.eq("P100"))
        .one(&*app.state.db)
        .await
        .expect("query line")
        .expect("line exists");
    assert_eq!(line.quantity_done, 3);
    assert_eq!(line.status, order_line::STATUS_DONE);

    let order_row = order_entity::Entity::find()
        .filter(order_entity::Column::OrderNumber.eq("ORD-1"))
        .one(&*app.state.db)
        .await
        .expect("query order")
        .expect("order exists");
    assert_eq!(order_row.status_bucket, "picked");
}

#[tokio::test]
async fn allocation_stops_exactly_at_required_units() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("P200", 1, "Gadget")]).await;
    app.seed_orders(vec![order("ORD-2", &[("P200", "SKU200", 2)])])
        .await;

    let ledger = WorkLedgerService::new(app.state.db.clone());
    assert!(ledger.allocate_one_unit("P200").await.expect("alloc 1").is_some());
    assert!(ledger.allocate_one_unit("P200").await.expect("alloc 2").is_some());
    assert!(ledger.allocate_one_unit("P200").await.expect("alloc 3").is_none());

    let line = order_line::Entity::find()
        .filter(order_line::Column::ProductCode.eq("P200"))
        .one(&*app.state.db)
        .await
        .expect("query line")
        .expect("line exists");
    assert_eq!(line.quantity_done, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_allocations_claim_each_unit_exactly_once() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("P250", 1, "Contested gadget")])
        .await;
    app.seed_orders(vec![
        order("ORD-C1", &[("P250", "SKU250", 3)]),
        order("ORD-C2", &[("P250", "SKU250", 2)]),
    ])
    .await;

    let ledger = WorkLedgerService::new(app.state.db.clone());
    let attempts: Vec<_> = (0..12)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.allocate_one_unit("P250").await })
        })
        .collect();

    let mut claimed = 0;
    for handle in attempts {
        if handle.await.expect("task").expect("allocate").is_some() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 5);

    let lines = order_line::Entity::find()
        .filter(order_line::Column::ProductCode.eq("P250"))
        .all(&*app.state.db)
        .await
        .expect("query lines");
    let done: i32 = lines.iter().map(|l| l.quantity_done).sum();
    assert_eq!(done, 5);
    assert!(lines.iter().all(|l| l.quantity_done <= l.quantity_required));
}

#[tokio::test]
async fn assignment_is_idempotent_for_the_same_operator() {
    let app = TestApp::new().await;
    app.seed_products(vec![
        product("P300", 4, "Alpha part"),
        product("P301", 4, "Beta part"),
    ])
    .await;
    app.seed_orders(vec![
        order("ORD-3", &[("P300", "SKU300", 1)]),
        order("ORD-4", &[("P301", "SKU301", 1)]),
    ])
    .await;

    let op = operator();
    let first = app
        .state
        .services
        .picking
        .assign(op, 4)
        .await
        .expect("first assign")
        .expect("assignment");
    let again = app
        .state
        .services
        .picking
        .assign(op, 4)
        .await
        .expect("second assign")
        .expect("same assignment");
    assert_eq!(first.product.code, again.product.code);

    let leases = picking_lease::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count leases");
    assert_eq!(leases, 1);
}

#[tokio::test]
async fn leased_product_is_invisible_to_other_operators() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("P400", 2, "Solo item")]).await;
    app.seed_orders(vec![order("ORD-5", &[("P400", "SKU400", 1)])])
        .await;

    let holder = operator();
    let other = operator();

    let session = app
        .state
        .services
        .picking
        .assign(holder, 2)
        .await
        .expect("assign holder");
    assert!(session.is_some());

    let blocked = app
        .state
        .services
        .picking
        .assign(other, 2)
        .await
        .expect("assign other");
    assert!(blocked.is_none());
}

#[tokio::test]
async fn scan_with_wrong_code_is_rejected_without_progress() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("P500", 3, "Scanner test")]).await;
    app.seed_orders(vec![order("ORD-6", &[("P500", "SKU500", 1)])])
        .await;

    let op = operator();
    app.state
        .services
        .picking
        .assign(op, 3)
        .await
        .expect("assign")
        .expect("assignment");

    let err = app
        .state
        .services
        .picking
        .scan_unit(op, Some("TOTALLY-WRONG"))
        .await
        .expect_err("mismatched scan must fail");
    assert_matches!(err, ServiceError::InvalidInput(_));

    let line = order_line::Entity::find()
        .filter(order_line::Column::ProductCode.eq("P500"))
        .one(&*app.state.db)
        .await
        .expect("query line")
        .expect("line exists");
    assert_eq!(line.quantity_done, 0);
}

#[tokio::test]
async fn reimport_raises_required_but_keeps_done_units() {
    let app = TestApp::new().await;
    app.seed_products(vec![product("P600", 5, "Restock item")]).await;
    app.seed_orders(vec![order("ORD-7", &[("P600", "SKU600", 3)])])
        .await;

    let op = operator();
    app.state
        .services
        .picking
        .assign(op, 5)
        .await
        .expect("assign")
        .expect("assignment");
    app.state
        .services
        .picking
        .scan_unit(op, None)
        .await
        .expect("scan");

    // Same order arrives again with a larger quantity.
    app.seed_orders(vec![order("ORD-7", &[("P600", "SKU600", 5)])])
        .await;

    let line = order_line::Entity::find()
        .filter(order_line::Column::ProductCode.eq("P600"))
        .one(&*app.state.db)
        .await
        .expect("query line")
        .expect("line exists");
    assert_eq!(line.quantity_done, 1);
    assert_eq!(line.quantity_required, 5);
    assert_eq!(line.status, order_line::STATUS_PENDING);

    let outcome = app
        .state
        .services
        .picking
        .scan_unit(op, None)
        .await
        .expect("scan after reimport");
    assert_eq!(outcome.remaining, 3);
}

#[tokio::test]
async fn department_queues_aggregate_pending_units() {
    let app = TestApp::new().await;
    app.seed_products(vec![
        product("P700", 1, "Queue item A"),
        product("P701", 1, "Queue item B"),
        product("P702", 2, "Queue item C"),
    ])
    .await;
    app.seed_orders(vec![
        order("ORD-8", &[("P700", "SKU700", 2)]),
        order("ORD-9", &[("P701", "SKU701", 1)]),
        order("ORD-10", &[("P702", "SKU702", 4)]),
    ])
    .await;

    let queues = app
        .state
        .services
        .picking
        .department_queues()
        .await
        .expect("queues");
    assert_eq!(queues.len(), 2);

    let dept1 = queues
        .iter()
        .find(|q| q.department_code == 1)
        .expect("department 1 present");
    assert_eq!(dept1.products_with_pending, 2);
    assert_eq!(dept1.units_pending, 3);

    let dept2 = queues
        .iter()
        .find(|q| q.department_code == 2)
        .expect("department 2 present");
    assert_eq!(dept2.products_with_pending, 1);
    assert_eq!(dept2.units_pending, 4);
}
