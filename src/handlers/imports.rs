use axum::{
    extract::State,
    response::{IntoResponse, Json},
};

use crate::handlers::AppState;
use crate::services::ingestion::{OrderImport, ProductImport};
use crate::{errors::ServiceError, ApiResponse};

/// POST /api/v1/imports/products
pub async fn products(
    State(state): State<AppState>,
    Json(batch): Json<Vec<ProductImport>>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.ingestion.upsert_products(batch).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/v1/imports/orders
pub async fn orders(
    State(state): State<AppState>,
    Json(batch): Json<Vec<OrderImport>>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.ingestion.upsert_orders(batch).await?;
    Ok(Json(ApiResponse::ok(report)))
}
