use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use crate::handlers::{AppState, OperatorId};
use crate::services::packing::OrderType;
use crate::{errors::ServiceError, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub order_type: OrderType,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub sku: String,
}

/// GET /api/v1/packing/queues
pub async fn queues(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.packing.queue_summary().await?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// POST /api/v1/packing/assign
pub async fn assign(
    State(state): State<AppState>,
    operator: OperatorId,
    Json(payload): Json<AssignRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .packing
        .assign(operator.0, payload.order_type)
        .await?;
    match session {
        Some(session) => Ok(Json(ApiResponse::ok(Some(session)))),
        None => Ok(Json(ApiResponse::with_message(
            None,
            "no orders waiting in this queue",
        ))),
    }
}

/// GET /api/v1/packing/session
pub async fn session(
    State(state): State<AppState>,
    operator: OperatorId,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .packing
        .current_assignment(operator.0)
        .await?;
    Ok(Json(ApiResponse::ok(session)))
}

/// POST /api/v1/packing/scan
pub async fn scan(
    State(state): State<AppState>,
    operator: OperatorId,
    Json(payload): Json<ScanRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .packing
        .scan_unit(operator.0, &payload.sku)
        .await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /api/v1/packing/session
pub async fn release(
    State(state): State<AppState>,
    operator: OperatorId,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.packing.release_session(operator.0).await?;
    Ok(Json(ApiResponse::with_message((), "session released")))
}
