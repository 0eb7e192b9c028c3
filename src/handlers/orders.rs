use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use crate::handlers::AppState;
use crate::services::order_status::OrderBucket;
use crate::{errors::ServiceError, ApiResponse};

const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub bucket: OrderBucket,
    pub limit: Option<u64>,
}

/// GET /api/v1/orders/summary
pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let counts = state.services.order_status.bucket_counts().await?;
    Ok(Json(ApiResponse::ok(counts)))
}

/// GET /api/v1/orders?bucket=picked&limit=20
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    let orders = state
        .services
        .order_status
        .list_by_bucket(query.bucket, limit)
        .await?;
    Ok(Json(ApiResponse::ok(orders)))
}
