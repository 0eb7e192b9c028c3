//! Packhouse API Library
//!
//! Warehouse picking, packing and shipping coordination over a relational
//! store. Work is handed to station operators through short-lived leases so
//! that two stations never hold the same product batch or order at once.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use handlers::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Common response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/picking/queues", get(handlers::picking::queues))
        .route("/picking/assign", post(handlers::picking::assign))
        .route("/picking/session", get(handlers::picking::session))
        .route("/picking/session", delete(handlers::picking::release))
        .route("/picking/scan", post(handlers::picking::scan))
        .route("/packing/queues", get(handlers::packing::queues))
        .route("/packing/assign", post(handlers::packing::assign))
        .route("/packing/session", get(handlers::packing::session))
        .route("/packing/session", delete(handlers::packing::release))
        .route("/packing/scan", post(handlers::packing::scan))
        .route("/shipping/queue", get(handlers::shipping::queue))
        .route("/shipping/check", post(handlers::shipping::check))
        .route("/shipping/finalize", post(handlers::shipping::finalize))
        .route("/manifests", get(handlers::shipping::list_manifests))
        .route("/manifests/:id", get(handlers::shipping::manifest_detail))
        .route("/orders/summary", get(handlers::orders::summary))
        .route("/orders", get(handlers::orders::list))
        .route("/imports/products", post(handlers::imports::products))
        .route("/imports/orders", post(handlers::imports::orders));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
