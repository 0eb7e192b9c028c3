pub mod health;
pub mod imports;
pub mod orders;
pub mod packing;
pub mod picking;
pub mod shipping;

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    ingestion::IngestionService, order_status::OrderStatusService, packing::PackingService,
    picking::PickingService, shipping::ShippingService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub picking: Arc<PickingService>,
    pub packing: Arc<PackingService>,
    pub shipping: Arc<ShippingService>,
    pub order_status: Arc<OrderStatusService>,
    pub ingestion: Arc<IngestionService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        let lease_ttl = config.lease_ttl();
        Self {
            picking: Arc::new(PickingService::new(
                db.clone(),
                event_sender.clone(),
                lease_ttl,
            )),
            packing: Arc::new(PackingService::new(
                db.clone(),
                event_sender.clone(),
                lease_ttl,
            )),
            shipping: Arc::new(ShippingService::new(db.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone(), event_sender)),
            ingestion: Arc::new(IngestionService::new(db)),
        }
    }
}

/// Opaque operator identity carried on every station request. Authentication
/// lives outside this service; the header value is trusted as-is.
pub const OPERATOR_HEADER: &str = "x-operator-id";

#[derive(Debug, Clone, Copy)]
pub struct OperatorId(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OperatorId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OPERATOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("missing {OPERATOR_HEADER} header"))
            })?;
        let id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::InvalidInput(format!("{OPERATOR_HEADER} must be a UUID"))
        })?;
        Ok(OperatorId(id))
    }
}
