use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use validator::Validate;

use crate::handlers::{AppState, OperatorId};
use crate::{errors::ServiceError, ApiResponse};

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRequest {
    #[validate(range(min = 0))]
    pub department_code: i32,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub sku: Option<String>,
}

/// GET /api/v1/picking/queues
pub async fn queues(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let queues = state.services.picking.department_queues().await?;
    Ok(Json(ApiResponse::ok(queues)))
}

/// POST /api/v1/picking/assign
pub async fn assign(
    State(state): State<AppState>,
    operator: OperatorId,
    Json(payload): Json<AssignRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let session = state
        .services
        .picking
        .assign(operator.0, payload.department_code)
        .await?;
    match session {
        Some(session) => Ok(Json(ApiResponse::ok(Some(session)))),
        None => Ok(Json(ApiResponse::with_message(
            None,
            "no pending work in this department",
        ))),
    }
}

/// GET /api/v1/picking/session
pub async fn session(
    State(state): State<AppState>,
    operator: OperatorId,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.picking.current_session(operator.0).await?;
    Ok(Json(ApiResponse::ok(session)))
}

/// POST /api/v1/picking/scan
pub async fn scan(
    State(state): State<AppState>,
    operator: OperatorId,
    Json(payload): Json<ScanRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .picking
        .scan_unit(operator.0, payload.sku.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /api/v1/picking/session
pub async fn release(
    State(state): State<AppState>,
    operator: OperatorId,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.picking.release_session(operator.0).await?;
    Ok(Json(ApiResponse::with_message((), "session released")))
}
