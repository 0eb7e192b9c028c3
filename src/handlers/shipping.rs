use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{AppState, OperatorId};
use crate::{errors::ServiceError, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub order_number: String,
}

/// GET /api/v1/shipping/queue
///
/// Orders already verified and waiting for the next batch.
pub async fn queue(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.shipping.pending_checked_orders().await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// POST /api/v1/shipping/check
pub async fn check(
    State(state): State<AppState>,
    _operator: OperatorId,
    Json(payload): Json<CheckRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .shipping
        .check_order(&payload.order_number)
        .await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// POST /api/v1/shipping/finalize
pub async fn finalize(
    State(state): State<AppState>,
    operator: OperatorId,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.shipping.finalize_batch(operator.0).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// GET /api/v1/manifests
pub async fn list_manifests(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let manifests = state.services.shipping.list_manifests().await?;
    Ok(Json(ApiResponse::ok(manifests)))
}

/// GET /api/v1/manifests/:id
pub async fn manifest_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state
        .services
        .shipping
        .manifest_detail(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("manifest {id} not found")))?;
    Ok(Json(ApiResponse::ok(detail)))
}
