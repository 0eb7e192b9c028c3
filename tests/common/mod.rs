#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use packhouse_api::{
    config::AppConfig,
    db,
    events::{event_channel, process_events},
    services::ingestion::{OrderImport, OrderLineImport, ProductImport},
    AppState,
};

/// Harness backed by a throwaway SQLite file, migrated from scratch per test.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = dir.path().join("packhouse_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = event_channel(256);
        let event_task = tokio::spawn(process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = packhouse_api::app(state.clone());

        Self {
            state,
            router,
            _event_task: event_task,
            _dir: dir,
        }
    }

    /// Sends a request through the router and returns (status, parsed body).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        operator: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(operator) = operator {
            builder = builder.header("x-operator-id", operator.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build test request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read response body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not JSON")
        };
        (status, value)
    }

    pub async fn seed_products(&self, products: Vec<ProductImport>) {
        self.state
            .services
            .ingestion
            .upsert_products(products)
            .await
            .expect("seed products");
    }

    pub async fn seed_orders(&self, orders: Vec<OrderImport>) {
        self.state
            .services
            .ingestion
            .upsert_orders(orders)
            .await
            .expect("seed orders");
    }
}

pub fn product(code: &str, department_code: i32, description: &str) -> ProductImport {
    ProductImport {
        code: code.to_string(),
        manufacturer_code: None,
        description: description.to_string(),
        reference: None,
        unit: Some("un".to_string()),
        department_code,
        department: Some(format!("dept-{department_code}")),
        active: true,
    }
}

pub fn product_with_manufacturer_code(
    code: &str,
    department_code: i32,
    description: &str,
    manufacturer_code: &str,
) -> ProductImport {
    ProductImport {
        manufacturer_code: Some(manufacturer_code.to_string()),
        ..product(code, department_code, description)
    }
}

/// Builds an order import from `(product_code, sku, quantity)` triples.
pub fn order(order_number: &str, lines: &[(&str, &str, i32)]) -> OrderImport {
    OrderImport {
        order_number: order_number.to_string(),
        buyer: Some("Test Buyer".to_string()),
        platform: Some("marketplace".to_string()),
        placed_at: Some(chrono::Utc::now()),
        total_amount: None,
        lines: lines
            .iter()
            .map(|(code, sku, quantity)| OrderLineImport {
                product_code: code.to_string(),
                sku: sku.to_string(),
                description: Some(format!("line for {code}")),
                quantity_required: *quantity,
            })
            .collect(),
    }
}

pub fn operator() -> Uuid {
    Uuid::new_v4()
}
